//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `config.toml` lives in the site directory passed with `--site` (default:
//! the working directory). Relative paths inside it resolve against that
//! directory:
//!
//! ```text
//! site/
//! ├── config.toml
//! ├── content/             # index.md, projects.md, contact.md, experience.md
//! ├── instance/gallery.db  # catalog, created on first start
//! └── static/uploads/      # uploaded image bytes
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "content"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//!
//! [storage]
//! database = "instance/gallery.db"
//! uploads = "static/uploads"
//!
//! [gallery]
//! max_upload_bytes = 134217728
//! session_idle_minutes = 1440
//! allowed_extensions = ["png", "jpg", "jpeg", "gif", "webp"]
//!
//! [gallery.passwords]
//! "123" = "public"
//! "admin123" = "admin"
//! ```
//!
//! Unknown keys are rejected to catch typos early. `[gallery.passwords]`
//! replaces the stock table as a whole when present, so the stock secrets
//! never linger next to user-chosen ones.

use crate::access::AccessLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory holding the Markdown bodies of the static pages.
    pub content_root: String,
    /// Listener settings.
    pub server: ServerConfig,
    /// Catalog and uploads locations.
    pub storage: StorageConfig,
    /// Upload limits and access secrets.
    pub gallery: GalleryConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_root: "content".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.host must not be empty".into(),
            ));
        }
        if self.gallery.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "gallery.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.gallery.session_idle_minutes == 0 {
            return Err(ConfigError::Validation(
                "gallery.session_idle_minutes must be non-zero".into(),
            ));
        }
        if self.gallery.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "gallery.allowed_extensions must not be empty".into(),
            ));
        }
        if let Some(ext) = self
            .gallery
            .allowed_extensions
            .iter()
            .find(|e| e.is_empty() || e.contains('.'))
        {
            return Err(ConfigError::Validation(format!(
                "gallery.allowed_extensions entry {ext:?} must be a bare extension like \"png\""
            )));
        }
        if self.gallery.passwords.is_empty() {
            return Err(ConfigError::Validation(
                "gallery.passwords must define at least one secret".into(),
            ));
        }
        if self.gallery.passwords.keys().any(|s| s.is_empty()) {
            return Err(ConfigError::Validation(
                "gallery.passwords secrets must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether the access secrets are still the stock ones.
    pub fn uses_stock_passwords(&self) -> bool {
        self.gallery.passwords == GalleryConfig::default().passwords
    }

    /// Resolve every relative path in the config against `site_dir`.
    pub fn resolve_paths(&self, site_dir: &Path) -> ResolvedPaths {
        ResolvedPaths {
            content_root: site_dir.join(&self.content_root),
            database: site_dir.join(&self.storage.database),
            uploads: site_dir.join(&self.storage.uploads),
        }
    }
}

/// Absolute-or-site-relative filesystem locations derived from the config.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub content_root: PathBuf,
    pub database: PathBuf,
    pub uploads: PathBuf,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the catalog and the uploaded bytes live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite catalog file. Parent directories are created on open.
    pub database: String,
    /// Directory holding uploaded image bytes, served under `/uploads/`.
    pub uploads: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "instance/gallery.db".to_string(),
            uploads: "static/uploads".to_string(),
        }
    }
}

/// Gallery limits and shared secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Aggregate request body cap, enforced before handlers run.
    pub max_upload_bytes: usize,
    /// Minutes without a request after which a visitor's session is dropped.
    pub session_idle_minutes: u64,
    /// Extensions (without the dot) accepted for uploads, any case.
    pub allowed_extensions: Vec<String>,
    /// Shared secret → access level.
    pub passwords: BTreeMap<String, AccessLevel>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 128 * 1024 * 1024,
            session_idle_minutes: 24 * 60,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            passwords: BTreeMap::from([
                ("123".to_string(), AccessLevel::Public),
                ("admin123".to_string(), AccessLevel::Admin),
            ]),
        }
    }
}

impl GalleryConfig {
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Drop the stock password table when the overlay brings its own.
fn strip_stock_passwords(base: &mut toml::Value, overlay: &toml::Value) {
    let overlay_has_passwords = overlay
        .get("gallery")
        .and_then(|g| g.get("passwords"))
        .is_some();
    if !overlay_has_passwords {
        return;
    }
    if let Some(gallery) = base.get_mut("gallery").and_then(|g| g.as_table_mut()) {
        gallery.remove("passwords");
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    mut base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => {
            strip_stock_passwords(&mut base, &ov);
            merge_toml(base, ov)
        }
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(site_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(site_dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# Relative paths resolve against the directory holding this file.

# Markdown bodies for the public pages:
#   index.md, projects.md, contact.md, experience.md
content_root = "content"

# ---------------------------------------------------------------------------
# Listener
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 5000

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# SQLite catalog of cards and images.
database = "instance/gallery.db"

# Uploaded image bytes, served under /uploads/.
uploads = "static/uploads"

# ---------------------------------------------------------------------------
# Gallery
# ---------------------------------------------------------------------------
[gallery]
# Cap on a whole request body, folder uploads included (128 MiB).
max_upload_bytes = 134217728

# Sessions idle this long are forgotten; the visitor logs in again (1 day).
session_idle_minutes = 1440

# Extensions accepted for uploads, compared case-insensitively.
allowed_extensions = ["png", "jpg", "jpeg", "gif", "webp"]

# Shared secrets and the access level each one grants.
# "public" may browse the gallery; "admin" may also change it.
# Defining this table replaces the stock secrets entirely. Change them.
[gallery.passwords]
"123" = "public"
"admin123" = "admin"
"##
}
