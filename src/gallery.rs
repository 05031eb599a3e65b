//! Gallery operations: browse the card tree, manage cards, upload and delete
//! images.
//!
//! Every operation takes the caller's [`Session`] and checks it against the
//! [`AccessGate`] before touching anything. Browsing needs any access level;
//! everything that changes the gallery needs `admin`.
//!
//! ## Catalog and files
//!
//! Rows live in the [`Catalog`], bytes in a [`FileStore`]. Each operation runs
//! its catalog work in one transaction; file writes and deletions happen
//! inside that transaction but are not undone by a rollback. Two consequences
//! are kept on purpose and covered by tests:
//!
//! - **Folder upload failure**: the card and image rows are rolled back, but
//!   files already written for the batch stay in the uploads directory.
//! - **Card deletion**: only the files of the card's *direct* images are
//!   unlinked. Rows for nested cards and their images are deleted, but their
//!   files stay on disk.
//!
//! ## Feedback
//!
//! Results carry the user-facing messages the HTTP layer flashes. The single
//! card upload warns once per rejected file; the folder upload skips
//! disallowed files without a word.

use crate::access::{AccessError, AccessGate, AccessLevel};
use crate::catalog::{CascadeDeletion, Catalog, Writer};
use crate::files::FileStore;
use crate::naming::{folder_card_name, is_allowed};
use crate::session::{Flash, Session};
use crate::types::{Card, CardNode, Image};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Card not found.")]
    CardNotFound(i64),
    #[error("Card not found.")]
    NoCardSelected,
    #[error("Image not found.")]
    ImageNotFound(i64),
    #[error("{0}")]
    Validation(String),
    #[error("An error occurred during folder upload: {0}")]
    FolderUpload(String),
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("File error: {0}")]
    Io(#[from] io::Error),
}

impl GalleryError {
    /// Lookup of an id taken from the request path failed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GalleryError::CardNotFound(_) | GalleryError::ImageNotFound(_)
        )
    }

    fn validation(message: &str) -> Self {
        GalleryError::Validation(message.to_string())
    }
}

/// One uploaded file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-side name, possibly carrying a relative path. Empty when the
    /// form part had no filename.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// What a visitor sees on the gallery page.
#[derive(Debug, Clone)]
pub struct GalleryView {
    pub access: AccessLevel,
    pub cards: Vec<CardNode>,
}

/// Outcome of uploading files into an existing card.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub card: Card,
    pub stored: Vec<Image>,
    /// Client names of files refused for their extension.
    pub rejected: Vec<String>,
}

impl ImageUpload {
    pub fn flashes(&self) -> Vec<Flash> {
        let mut flashes: Vec<Flash> = self
            .rejected
            .iter()
            .map(|name| Flash::error(format!("File \"{name}\" is not an allowed type.")))
            .collect();
        if self.stored.is_empty() {
            flashes.push(Flash::error("No valid files were selected or uploaded."));
        } else {
            flashes.push(Flash::success(format!(
                "{} image(s) uploaded successfully.",
                self.stored.len()
            )));
        }
        flashes
    }
}

/// Outcome of uploading a folder as a new card.
#[derive(Debug, Clone)]
pub struct FolderUpload {
    pub card: Card,
    pub stored: Vec<Image>,
    /// Files skipped for their extension or a missing name.
    pub skipped: usize,
}

impl FolderUpload {
    pub fn flash(&self) -> Flash {
        Flash::success(format!(
            "Folder \"{}\" created with {} images.",
            self.card.name,
            self.stored.len()
        ))
    }
}

/// Outcome of deleting a card subtree.
#[derive(Debug)]
pub struct CardDeletion {
    pub card: Card,
    pub removed: CascadeDeletion,
    /// Files actually unlinked from the store.
    pub unlinked: Vec<String>,
}

impl CardDeletion {
    pub fn flash(&self) -> Flash {
        Flash::success(format!(
            "Card \"{}\" and all its contents deleted.",
            self.card.name
        ))
    }
}

/// The gallery service.
pub struct Gallery {
    catalog: Mutex<Catalog>,
    files: Arc<dyn FileStore>,
    gate: AccessGate,
    allowed_extensions: Vec<String>,
}

impl Gallery {
    pub fn new(
        catalog: Catalog,
        files: Arc<dyn FileStore>,
        gate: AccessGate,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            files,
            gate,
            allowed_extensions,
        }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Top-level cards, for any logged-in visitor.
    pub fn list_top_level(&self, session: &Session) -> Result<Vec<Card>, GalleryError> {
        self.gate.authorize(session, AccessLevel::Public)?;
        Ok(self.catalog().top_level_cards()?)
    }

    /// The full tree plus the visitor's level, for rendering.
    pub fn tree(&self, session: &Session) -> Result<GalleryView, GalleryError> {
        let access = self.gate.authorize(session, AccessLevel::Public)?;
        let cards = self.catalog().tree()?;
        Ok(GalleryView { access, cards })
    }

    /// Create a card under `parent` (`None`, `""`, or `"none"` for top level).
    ///
    /// The parent id is not checked beyond what the catalog's foreign key
    /// enforces.
    pub fn add_card(
        &self,
        session: &Session,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Card, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;
        if name.is_empty() {
            return Err(GalleryError::validation("Card name cannot be empty."));
        }
        let parent_id = parse_parent(parent)?;

        let card = self
            .catalog()
            .write(|w| w.insert_card(name, parent_id))?;
        info!(card = card.id, parent = ?parent_id, name, "card created");
        Ok(card)
    }

    pub fn edit_card(
        &self,
        session: &Session,
        card_id: i64,
        new_name: &str,
    ) -> Result<Card, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;

        let card = self.catalog().write(|w| {
            let mut card = require_card(w, card_id)?;
            if new_name.is_empty() {
                return Err(GalleryError::validation("New name cannot be empty."));
            }
            w.rename_card(card_id, new_name)?;
            card.name = new_name.to_string();
            Ok(card)
        })?;
        info!(card = card_id, name = new_name, "card renamed");
        Ok(card)
    }

    /// Delete a card, its subtree, and every image row in it.
    ///
    /// Only the files of the card's own images are unlinked; files of nested
    /// cards' images stay in the store.
    pub fn delete_card(
        &self,
        session: &Session,
        card_id: i64,
    ) -> Result<CardDeletion, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;

        let deletion = self.catalog().write(|w| {
            let card = require_card(w, card_id)?;
            let unlinked = w
                .images_of(card_id)?
                .into_iter()
                .filter(|image| self.discard_file(&image.filename))
                .map(|image| image.filename)
                .collect();
            let removed = w.delete_card_tree(card_id)?;
            Ok::<_, GalleryError>(CardDeletion {
                card,
                removed,
                unlinked,
            })
        })?;
        info!(
            card = card_id,
            cards = deletion.removed.cards.len(),
            images = deletion.removed.images.len(),
            files = deletion.unlinked.len(),
            "card deleted"
        );
        Ok(deletion)
    }

    /// Store files into an existing card.
    ///
    /// Nameless parts are ignored, disallowed extensions are reported in
    /// [`ImageUpload::rejected`], the rest are saved and linked. The batch
    /// commits once; a storage or file error rolls back every row of it.
    pub fn upload_image(
        &self,
        session: &Session,
        card_id: Option<i64>,
        uploads: Vec<Upload>,
    ) -> Result<ImageUpload, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;
        let card_id = card_id.ok_or(GalleryError::NoCardSelected)?;

        let report = self.catalog().write(|w| {
            let card = require_card(w, card_id)?;
            let mut stored = Vec::new();
            let mut rejected = Vec::new();
            for upload in uploads {
                if upload.filename.is_empty() {
                    continue;
                }
                if !is_allowed(&upload.filename, &self.allowed_extensions) {
                    rejected.push(upload.filename);
                    continue;
                }
                stored.push(self.store(w, &upload, card_id)?);
            }
            Ok::<_, GalleryError>(ImageUpload {
                card,
                stored,
                rejected,
            })
        })?;
        info!(
            card = card_id,
            stored = report.stored.len(),
            rejected = report.rejected.len(),
            "images uploaded"
        );
        Ok(report)
    }

    /// Create a new top-level card from an uploaded folder.
    ///
    /// The card is named after the first file's leading path segment. The
    /// whole batch is one transaction; on failure no rows survive, but files
    /// already written stay in the store.
    pub fn upload_folder(
        &self,
        session: &Session,
        uploads: Vec<Upload>,
    ) -> Result<FolderUpload, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;
        let any_named = uploads.iter().any(|u| !u.filename.is_empty());
        let Some(first) = uploads.first().filter(|_| any_named) else {
            return Err(GalleryError::validation("No folder or files selected."));
        };
        let name = folder_card_name(&first.filename);

        let result = self.catalog().write(|w| {
            let card = w.insert_card(&name, None)?;
            let mut stored = Vec::new();
            let mut skipped = 0;
            for upload in &uploads {
                if is_allowed(&upload.filename, &self.allowed_extensions) {
                    stored.push(self.store(w, upload, card.id)?);
                } else {
                    skipped += 1;
                }
            }
            Ok::<_, GalleryError>(FolderUpload {
                card,
                stored,
                skipped,
            })
        });

        match result {
            Ok(report) => {
                info!(
                    card = report.card.id,
                    name = %report.card.name,
                    stored = report.stored.len(),
                    skipped = report.skipped,
                    "folder uploaded"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(name = %name, error = %e, "folder upload rolled back; written files kept");
                Err(GalleryError::FolderUpload(e.to_string()))
            }
        }
    }

    pub fn delete_image(&self, session: &Session, image_id: i64) -> Result<Image, GalleryError> {
        self.gate.authorize(session, AccessLevel::Admin)?;

        let image = self.catalog().write(|w| {
            let image = w
                .image(image_id)?
                .ok_or(GalleryError::ImageNotFound(image_id))?;
            self.discard_file(&image.filename);
            w.delete_image(image_id)?;
            Ok::<_, GalleryError>(image)
        })?;
        info!(image = image_id, filename = %image.filename, "image deleted");
        Ok(image)
    }

    /// Save one upload and link it to `card_id`.
    //
    // DiskStore picks the name with check-then-write: two concurrent uploads
    // of the same sanitized name may collide.
    fn store(&self, w: &Writer<'_>, upload: &Upload, card_id: i64) -> Result<Image, GalleryError> {
        let filename = self.files.save(&upload.filename, &upload.bytes)?;
        Ok(w.insert_image(&filename, card_id)?)
    }

    /// Best-effort unlink. Returns whether the file was removed.
    fn discard_file(&self, filename: &str) -> bool {
        match self.files.remove(filename) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(filename, "file already gone");
                false
            }
            Err(e) => {
                warn!(filename, error = %e, "could not remove file");
                false
            }
        }
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_card(w: &Writer<'_>, card_id: i64) -> Result<Card, GalleryError> {
    w.card(card_id)?.ok_or(GalleryError::CardNotFound(card_id))
}

/// Parse the `parent_id` form field.
fn parse_parent(raw: Option<&str>) -> Result<Option<i64>, GalleryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| GalleryError::validation("Invalid parent card.")),
    }
}
