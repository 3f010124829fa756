use image::ImageFormat;
use std::path::Path;

/// Image types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageKind {
    /// Canonical extension written to disk, whatever the client called the file.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
            ImageKind::WebP => "webp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::WebP => "image/webp",
        }
    }

    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::WebP => Some(ImageKind::WebP),
            _ => None,
        }
    }
}

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("File is too large (maximum {} MB)", .max_bytes / (1024 * 1024))]
    TooLarge { max_bytes: u64 },
    #[error("File type not allowed. Use jpg, jpeg, png, gif or webp")]
    BadExtension,
    #[error("File content is not a supported image")]
    NotAnImage,
}

/// Decide what an uploaded file really is. The name's extension must be on the
/// allow-list and the leading bytes must identify a supported image format.
pub fn sniff_upload(
    original_name: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<ImageKind, UploadRejection> {
    if bytes.is_empty() {
        return Err(UploadRejection::Empty);
    }
    if bytes.len() as u64 > max_bytes {
        return Err(UploadRejection::TooLarge { max_bytes });
    }

    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadRejection::BadExtension);
    }

    image::guess_format(bytes)
        .ok()
        .and_then(ImageKind::from_format)
        .ok_or(UploadRejection::NotAnImage)
}

/// `<uuid>.<ext>` with the extension taken from the detected format.
pub fn stored_filename(kind: ImageKind) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), kind.extension())
}
