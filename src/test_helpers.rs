//! Shared test utilities for the folio test suite.
//!
//! Provides gallery fixtures backed by a temp directory, ready-made sessions
//! for each access level, and extractors that keep assertions short.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, gallery) = setup();
//! let card = gallery.add_card(&admin(), "Landscapes", None).unwrap();
//! upload(&gallery, card.id, &["dawn.jpg", "dusk.jpg"]);
//!
//! assert_eq!(upload_files(&tmp), vec!["dawn.jpg", "dusk.jpg"]);
//! ```

use std::sync::Arc;
use tempfile::TempDir;

use crate::access::{AccessGate, AccessLevel};
use crate::catalog::Catalog;
use crate::files::{DiskStore, FileStore};
use crate::gallery::{Gallery, Upload};
use crate::session::Session;
use crate::types::{Card, Image};

pub const PUBLIC_SECRET: &str = "visitor";
pub const ADMIN_SECRET: &str = "curator";

// =========================================================================
// Fixture setup
// =========================================================================

/// Gallery over an in-memory catalog and `<tmp>/uploads`.
pub fn setup() -> (TempDir, Gallery) {
    let tmp = TempDir::new().unwrap();
    let store = DiskStore::open(tmp.path().join("uploads")).unwrap();
    (tmp, gallery_with(Arc::new(store)))
}

/// Gallery over an in-memory catalog and the given file store.
pub fn gallery_with(files: Arc<dyn FileStore>) -> Gallery {
    Gallery::new(
        Catalog::open_in_memory().unwrap(),
        files,
        test_gate(),
        ["png", "jpg", "jpeg", "gif", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

pub fn test_gate() -> AccessGate {
    AccessGate::new([
        (PUBLIC_SECRET.to_string(), AccessLevel::Public),
        (ADMIN_SECRET.to_string(), AccessLevel::Admin),
    ])
}

// =========================================================================
// Sessions
// =========================================================================

pub fn admin() -> Session {
    Session {
        access: Some(AccessLevel::Admin),
        ..Session::default()
    }
}

pub fn public() -> Session {
    Session {
        access: Some(AccessLevel::Public),
        ..Session::default()
    }
}

// =========================================================================
// Actions and extractors
// =========================================================================

/// Upload files named `names` into `card_id` as admin. Panics on failure.
pub fn upload(gallery: &Gallery, card_id: i64, names: &[&str]) -> Vec<Image> {
    let uploads = names
        .iter()
        .map(|name| Upload::new(*name, format!("bytes of {name}")))
        .collect();
    gallery
        .upload_image(&admin(), Some(card_id), uploads)
        .unwrap_or_else(|e| panic!("upload of {names:?} into card {card_id} failed: {e}"))
        .stored
}

/// Sorted file names in `<tmp>/uploads`.
pub fn upload_files(tmp: &TempDir) -> Vec<String> {
    let dir = tmp.path().join("uploads");
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Card names in order.
pub fn card_names(cards: &[Card]) -> Vec<&str> {
    cards.iter().map(|c| c.name.as_str()).collect()
}
