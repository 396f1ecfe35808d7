//! Image capture: file -> base64 payload, and the single pending-image slot

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::error::ImageError;

/// Base64 image ready to be sent inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            mime_type: sniff_mime_type(bytes).to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Guess the MIME type from magic bytes, defaulting to JPEG (what phone cameras produce)
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47]) {
        "image/png"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// Read and encode a file. No type or size validation beyond what reading tolerates.
pub async fn encode_file(path: &Path) -> Result<EncodedImage, ImageError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ImageError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let image = EncodedImage::from_bytes(&bytes);
    debug!(path = %path.display(), bytes = bytes.len(), mime = %image.mime_type, "encoded image");
    Ok(image)
}

/// Result of an asynchronous encode, delivered back to whoever owns the slot
#[derive(Debug)]
pub enum ImageEvent {
    Encoded {
        selection: SelectionId,
        label: String,
        image: EncodedImage,
    },
    Failed {
        selection: SelectionId,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionId(u64);

/// At most one image waiting to be attached to the next outgoing turn
#[derive(Debug, Default)]
pub struct PendingInput {
    image: Option<EncodedImage>,
    label: Option<String>,
    latest_selection: u64,
}

impl PendingInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new selection; any encode still running for an older one becomes stale
    pub fn begin_selection(&mut self) -> SelectionId {
        self.latest_selection += 1;
        SelectionId(self.latest_selection)
    }

    pub fn is_current(&self, selection: SelectionId) -> bool {
        selection.0 == self.latest_selection
    }

    /// Store a finished encode. Returns false (and drops the image) if a newer
    /// selection has been started since.
    pub fn complete(&mut self, selection: SelectionId, label: impl Into<String>, image: EncodedImage) -> bool {
        if !self.is_current(selection) {
            return false;
        }
        self.image = Some(image);
        self.label = Some(label.into());
        true
    }

    /// Replace whatever is pending with `image`
    pub fn replace(&mut self, label: impl Into<String>, image: EncodedImage) -> Option<EncodedImage> {
        let selection = self.begin_selection();
        let previous = self.image.take();
        self.complete(selection, label, image);
        previous
    }

    pub fn take(&mut self) -> Option<EncodedImage> {
        self.label = None;
        self.image.take()
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.image.as_ref()
    }

    /// Display name of the pending image (usually the file name)
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sniff_mime_type() {
        assert_eq!(sniff_mime_type(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(sniff_mime_type(&[0x89, b'P', b'N', b'G', 0x0d]), "image/png");
        assert_eq!(sniff_mime_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime_type(b"GIF89a"), "image/gif");
        assert_eq!(sniff_mime_type(b"???"), "image/jpeg");
    }

    #[test]
    fn test_new_selection_replaces_pending() {
        let mut pending = PendingInput::new();
        pending.replace("first.jpg", EncodedImage::new("image/jpeg", "AAAA"));
        let previous = pending.replace("second.png", EncodedImage::new("image/png", "BBBB"));

        assert_eq!(previous.map(|i| i.data), Some("AAAA".to_string()));
        assert_eq!(pending.image().map(|i| i.data.as_str()), Some("BBBB"));
        assert_eq!(pending.label(), Some("second.png"));
    }

    #[test]
    fn test_stale_encode_is_dropped() {
        let mut pending = PendingInput::new();
        let first = pending.begin_selection();
        let second = pending.begin_selection();

        assert!(pending.complete(second, "b.png", EncodedImage::new("image/png", "BBBB")));
        assert!(!pending.complete(first, "a.jpg", EncodedImage::new("image/jpeg", "AAAA")));
        assert_eq!(pending.image().map(|i| i.data.as_str()), Some("BBBB"));
    }

    #[test]
    fn test_take_clears_slot() {
        let mut pending = PendingInput::new();
        pending.replace("a.jpg", EncodedImage::new("image/jpeg", "AAAA"));
        assert!(pending.take().is_some());
        assert!(pending.is_empty());
        assert_eq!(pending.label(), None);
        assert!(pending.take().is_none());
    }

    #[tokio::test]
    async fn test_encode_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a]).unwrap();

        let image = encode_file(file.path()).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0K");
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let err = encode_file(Path::new("/definitely/not/here.jpg")).await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.jpg"));
    }
}
