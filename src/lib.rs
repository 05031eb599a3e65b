//! # Folio
//!
//! A small personal site with a password-gated photo gallery. Four public
//! pages are rendered from Markdown; the gallery is a tree of named **cards**
//! (folders) holding uploaded images.
//!
//! # Architecture
//!
//! ```text
//! HTTP request
//!   → server     session cookie → SessionId, handler, flash + redirect
//!   → gallery    authorize against the AccessGate, run the operation
//!   → catalog    SQLite rows (card, image), one transaction per operation
//!   → files      uploaded bytes in a flat directory
//! ```
//!
//! The gallery service is synchronous and knows nothing about HTTP. Handlers
//! hand it the visitor's [`session::Session`] and turn its results into flash
//! messages, which keeps every gallery rule testable without a server.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`server`] | axum router, session middleware, handlers, graceful shutdown |
//! | [`gallery`] | Gallery operations: browse, card CRUD, uploads, deletes |
//! | [`catalog`] | SQLite storage: reads, transactional writer, cascade delete |
//! | [`files`] | `FileStore` trait and the on-disk uploads directory |
//! | [`access`] | Shared-secret access levels (`public`, `admin`) |
//! | [`session`] | Server-side sessions and flash messages |
//! | [`naming`] | Upload filename sanitizing, extension checks, folder card names |
//! | [`pages`] | Markdown site pages |
//! | [`render`] | Maud templates for every HTML page |
//! | [`config`] | `config.toml` loading, merging onto stock defaults, validation |
//! | [`types`] | `Card`, `Image`, and the resolved `CardNode` tree |
//! | [`output`] | CLI output formatting for the `tree` command |
//!
//! # Design Decisions
//!
//! ## Explicit Cascade Delete
//!
//! The schema has no `ON DELETE CASCADE`. Deleting a card walks its subtree
//! in the catalog and deletes image rows, then cards from the leaves up, in
//! one transaction. Only the files of the card's own images are unlinked;
//! files of images in nested cards stay in the uploads directory.
//!
//! ## Files Are Not Transactional
//!
//! Catalog writes roll back on error; file writes do not. A folder upload
//! that fails halfway leaves no rows behind but keeps the files it already
//! wrote.
//!
//! ## Server-Side Sessions
//!
//! The cookie carries only a random id. Access levels and flash messages live
//! in memory, so restarting the server logs everyone out. Sessions that
//! hold nothing are dropped at once and idle ones expire.

pub mod access;
pub mod catalog;
pub mod config;
pub mod files;
pub mod gallery;
pub mod naming;
pub mod output;
pub mod pages;
pub mod render;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
