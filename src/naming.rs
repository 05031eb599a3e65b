//! Centralized filename handling for uploads.
//!
//! Browsers send the client-side name of every uploaded file, and for folder
//! uploads that name carries the relative path (`Trip/day-1/a.jpg`). Three
//! decisions are made from it, all here:
//!
//! - **Allowed type**: the text after the last dot must be in the configured
//!   extension set, compared case-insensitively. The check runs on the name as
//!   sent, before sanitizing.
//! - **Stored name**: [`secure_filename`] turns the client name into a flat,
//!   shell-safe name. Path separators become underscores, so folder uploads
//!   keep their folder as a prefix (`Trip/a.jpg` → `Trip_a.jpg`).
//! - **Folder card name**: [`folder_card_name`] takes the first path segment
//!   of the first file in a folder upload.

use unicode_normalization::UnicodeNormalization;

/// Card name used when a folder upload carries no folder in its paths.
pub const DEFAULT_FOLDER_CARD: &str = "Uploaded Files";

/// Stem used when sanitizing leaves nothing behind (`"../"`, `"日本.jpg"`).
const FALLBACK_STEM: &str = "upload";

/// Sanitize a client-supplied filename for storage.
///
/// Stem and extension are cleaned separately, so a name whose stem vanishes
/// keeps its extension. Each part goes through:
///
/// - NFKD decomposition, after which non-ASCII characters are dropped
/// - `/` and `\` are treated as word breaks
/// - Runs of whitespace collapse into a single `_`
/// - Anything outside `[A-Za-z0-9_.-]` is removed
/// - Leading and trailing `.` and `_` are stripped
///
/// ```text
/// "My cool movie.mov"   → "My_cool_movie.mov"
/// "../../../etc/passwd" → "etc_passwd"
/// "Trip/a.jpg"          → "Trip_a.jpg"
/// "café.jpg"            → "cafe.jpg"
/// "日本.jpg"            → "upload.jpg"
/// ```
pub fn secure_filename(name: &str) -> String {
    let (stem, ext) = match split_extension(name) {
        (stem, ext) if !ext.contains(['/', '\\']) => (stem, ext),
        _ => (name, ""),
    };

    let mut stem = sanitize_part(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    match sanitize_part(ext) {
        ext if ext.is_empty() => stem,
        ext => format!("{stem}.{ext}"),
    }
}

fn sanitize_part(part: &str) -> String {
    let spaced: String = part
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Split a flat filename into stem and extension, the extension keeping its dot.
///
/// Leading dots belong to the stem, so `".hidden"` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => name.split_at(dot),
        _ => (name, ""),
    }
}

/// Whether the client-supplied name ends in one of the allowed extensions.
pub fn is_allowed(name: &str, allowed: &[String]) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Derive the card name for a folder upload from its first file's path.
///
/// - `"Trip/a.jpg"` → `"Trip"`
/// - `"Trip/day-1/a.jpg"` → `"Trip"`
/// - `"a.jpg"` → [`DEFAULT_FOLDER_CARD`]
pub fn folder_card_name(first_path: &str) -> String {
    match first_path.split_once('/') {
        Some((folder, _)) => folder.to_string(),
        None => DEFAULT_FOLDER_CARD.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["png", "jpg", "jpeg", "gif", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
    }

    #[test]
    fn traversal_components_are_flattened() {
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
    }

    #[test]
    fn folder_path_becomes_prefix() {
        assert_eq!(secure_filename("Trip/a.jpg"), "Trip_a.jpg");
        assert_eq!(secure_filename("Trip\\a.jpg"), "Trip_a.jpg");
    }

    #[test]
    fn unsafe_characters_removed() {
        assert_eq!(secure_filename("a<b>c?.png"), "abc.png");
        assert_eq!(secure_filename("we're #1!.gif"), "were_1.gif");
    }

    #[test]
    fn accents_decompose_to_ascii() {
        assert_eq!(secure_filename("café.jpg"), "cafe.jpg");
        assert_eq!(secure_filename("Ångström Ölpark.png"), "Angstrom_Olpark.png");
        assert_eq!(secure_filename("ﬁle.gif"), "file.gif");
    }

    #[test]
    fn leading_dots_and_underscores_stripped() {
        assert_eq!(secure_filename(".hidden.png"), "hidden.png");
        assert_eq!(secure_filename("__x__"), "x");
    }

    #[test]
    fn empty_result_falls_back() {
        assert_eq!(secure_filename("../"), "upload");
        assert_eq!(secure_filename("日本"), "upload");
    }

    #[test]
    fn empty_stem_keeps_extension() {
        assert_eq!(secure_filename("日本.jpg"), "upload.jpg");
        assert_eq!(secure_filename("Trip/東京.png"), "Trip.png");
        assert_eq!(secure_filename("???.webp"), "upload.webp");
    }

    #[test]
    fn trailing_dot_has_no_extension() {
        assert_eq!(secure_filename("photo."), "photo");
    }

    #[test]
    fn split_extension_at_last_dot() {
        assert_eq!(split_extension("a.b.jpg"), ("a.b", ".jpg"));
        assert_eq!(split_extension("photo.png"), ("photo", ".png"));
    }

    #[test]
    fn split_extension_without_dot() {
        assert_eq!(split_extension("README"), ("README", ""));
    }

    #[test]
    fn split_extension_leading_dot_is_stem() {
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn allowed_is_case_insensitive() {
        assert!(is_allowed("dawn.JPG", &allowed()));
        assert!(is_allowed("dawn.WebP", &allowed()));
    }

    #[test]
    fn allowed_checks_last_extension_only() {
        assert!(is_allowed("archive.tar.png", &allowed()));
        assert!(!is_allowed("photo.png.exe", &allowed()));
    }

    #[test]
    fn no_extension_not_allowed() {
        assert!(!is_allowed("photo", &allowed()));
        assert!(!is_allowed("photo.", &allowed()));
        assert!(!is_allowed("", &allowed()));
    }

    #[test]
    fn allowed_on_folder_path() {
        assert!(is_allowed("Trip/a.jpeg", &allowed()));
        assert!(!is_allowed("Trip/notes.txt", &allowed()));
    }

    #[test]
    fn folder_name_from_first_segment() {
        assert_eq!(folder_card_name("Trip/a.jpg"), "Trip");
        assert_eq!(folder_card_name("Trip/day-1/a.jpg"), "Trip");
    }

    #[test]
    fn folder_name_defaults_without_separator() {
        assert_eq!(folder_card_name("a.jpg"), "Uploaded Files");
    }
}
