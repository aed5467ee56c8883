//! Filename classification: media kind, junk detection, and MIME type.
//!
//! Everything here is a pure lookup on the lowercase extension.

use crate::ledger::MediaType;

const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "tiff", "tif", "bmp", "raw", "dng",
    "cr2", "nef", "arw",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v", "3gp"];

/// Camera sidecar files that are never migrated: `.THM` thumbnails,
/// `.SCR` screen proxies and Sony `.LRF` low-res previews.
const SKIP_EXTENSIONS: &[&str] = &["thm", "scr", "lrf"];

const MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("bmp", "image/bmp"),
    ("raw", "image/raw"),
    ("dng", "image/dng"),
    ("cr2", "image/x-canon-cr2"),
    ("nef", "image/x-nikon-nef"),
    ("arw", "image/x-sony-arw"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("m4v", "video/x-m4v"),
    ("3gp", "video/3gpp"),
];

/// Kind of media a filename refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Unknown,
}

impl MediaKind {
    /// Resolve the ledger media type for an asset.
    ///
    /// The extension wins when it is recognised; otherwise the catalog's
    /// photo/video flag decides.
    pub fn for_record(filename: &str, is_photo: bool) -> MediaType {
        match media_kind(filename) {
            MediaKind::Photo => MediaType::Photo,
            MediaKind::Video => MediaType::Video,
            MediaKind::Unknown if is_photo => MediaType::Photo,
            MediaKind::Unknown => MediaType::Video,
        }
    }
}

/// Lowercase extension without the dot, or `None` when there is none.
fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Classify a filename as photo, video, or unknown by extension.
///
/// Junk extensions classify as `Unknown`.
pub fn media_kind(filename: &str) -> MediaKind {
    let Some(ext) = extension(filename) else {
        return MediaKind::Unknown;
    };
    let ext = ext.as_str();
    if SKIP_EXTENSIONS.contains(&ext) {
        MediaKind::Unknown
    } else if PHOTO_EXTENSIONS.contains(&ext) {
        MediaKind::Photo
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Whether a file must never be migrated.
pub fn should_skip(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| SKIP_EXTENSIONS.contains(&ext.as_str()))
}

/// MIME type for the upload part, `application/octet-stream` when unknown.
pub fn mime_type(filename: &str) -> &'static str {
    extension(filename)
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}
