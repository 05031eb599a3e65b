//! Storage for uploaded image bytes.
//!
//! The [`FileStore`] trait is the seam between the gallery service and the
//! filesystem. The production implementation is [`DiskStore`], a flat
//! directory in which every file gets a sanitized, collision-free name:
//!
//! ```text
//! save("Trip/dawn.jpg")  → Trip_dawn.jpg
//! save("Trip/dawn.jpg")  → Trip_dawn_1.jpg
//! save("Trip/dawn.jpg")  → Trip_dawn_2.jpg
//! ```
//!
//! ## Concurrency
//!
//! Name selection is check-then-write. Two requests saving the same sanitized
//! name at the same moment can both see it free and the later write wins.
//! Uploads come from a single admin, so this is accepted rather than locked.

use crate::naming::{secure_filename, split_extension};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Persists uploaded bytes and removes them again.
pub trait FileStore: Send + Sync {
    /// Store `bytes` under a name derived from `original_name` and return
    /// that name. The returned name did not exist at call time.
    fn save(&self, original_name: &str, bytes: &[u8]) -> io::Result<String>;

    /// Delete a stored file by the name [`save`](FileStore::save) returned.
    fn remove(&self, filename: &str) -> io::Result<()>;
}

/// A flat directory of uploads.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Use `root` as the uploads directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_of(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// First free name for `sanitized`: the name itself, then `stem_1.ext`,
    /// `stem_2.ext`, and so on.
    fn free_name(&self, sanitized: &str) -> String {
        if !self.path_of(sanitized).exists() {
            return sanitized.to_string();
        }
        let (stem, ext) = split_extension(sanitized);
        let mut counter: u64 = 1;
        loop {
            let candidate = format!("{stem}_{counter}{ext}");
            if !self.path_of(&candidate).exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

impl FileStore for DiskStore {
    fn save(&self, original_name: &str, bytes: &[u8]) -> io::Result<String> {
        let filename = self.free_name(&secure_filename(original_name));
        fs::write(self.path_of(&filename), bytes)?;
        debug!(original = original_name, stored = %filename, "saved upload");
        Ok(filename)
    }

    fn remove(&self, filename: &str) -> io::Result<()> {
        fs::remove_file(self.path_of(filename))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Disk-backed store that starts failing after a number of saves.
    ///
    /// Files written before the failure stay on disk, which is what the
    /// rollback tests need to observe.
    pub struct FailingStore {
        pub inner: DiskStore,
        pub saves_before_failure: usize,
        pub saved: Mutex<Vec<String>>,
    }

    impl FailingStore {
        pub fn new(inner: DiskStore, saves_before_failure: usize) -> Self {
            Self {
                inner,
                saves_before_failure,
                saved: Mutex::new(Vec::new()),
            }
        }
    }

    impl FileStore for FailingStore {
        fn save(&self, original_name: &str, bytes: &[u8]) -> io::Result<String> {
            let mut saved = self.saved.lock().unwrap();
            if saved.len() >= self.saves_before_failure {
                return Err(io::Error::other("disk full"));
            }
            let name = self.inner.save(original_name, bytes)?;
            saved.push(name.clone());
            Ok(name)
        }

        fn remove(&self, filename: &str) -> io::Result<()> {
            self.inner.remove(filename)
        }
    }

    #[test]
    fn open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("static/uploads");
        DiskStore::open(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn save_writes_sanitized_name() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();

        let name = store.save("my photo.jpg", b"jpeg bytes").unwrap();
        assert_eq!(name, "my_photo.jpg");
        assert_eq!(fs::read(tmp.path().join(&name)).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn duplicate_names_get_numeric_suffix() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();

        let first = store.save("dawn.png", b"1").unwrap();
        let second = store.save("dawn.png", b"2").unwrap();
        let third = store.save("dawn.png", b"3").unwrap();

        assert_eq!(first, "dawn.png");
        assert_eq!(second, "dawn_1.png");
        assert_eq!(third, "dawn_2.png");
        assert_eq!(fs::read(tmp.path().join("dawn.png")).unwrap(), b"1");
        assert_eq!(fs::read(tmp.path().join("dawn_1.png")).unwrap(), b"2");
    }

    #[test]
    fn suffix_fills_first_gap() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.gif"), "x").unwrap();
        fs::write(tmp.path().join("a_2.gif"), "x").unwrap();

        assert_eq!(store.save("a.gif", b"new").unwrap(), "a_1.gif");
    }

    #[test]
    fn suffix_without_extension() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        store.save("notes", b"1").unwrap();
        assert_eq!(store.save("notes", b"2").unwrap(), "notes_1");
    }

    #[test]
    fn remove_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let name = store.save("x.webp", b"x").unwrap();

        assert!(tmp.path().join(&name).is_file());
        store.remove(&name).unwrap();
        assert!(!tmp.path().join(&name).exists());
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let err = store.remove("ghost.png").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn failing_store_keeps_earlier_files() {
        let tmp = TempDir::new().unwrap();
        let store = FailingStore::new(DiskStore::open(tmp.path()).unwrap(), 1);

        let first = store.save("a.png", b"a").unwrap();
        assert!(store.save("b.png", b"b").is_err());
        assert!(tmp.path().join(first).exists());
        assert!(!tmp.path().join("b.png").exists());
    }
}
