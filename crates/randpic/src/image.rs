//! Image validation by magic number

use std::fmt;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];

/// Accepted image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Invalid image: only JPEG and PNG files are accepted")]
    InvalidImage,
}

impl ImageFormat {
    /// Detects the format from the leading bytes
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else {
            None
        }
    }

    /// Detects the format, rejecting anything else
    ///
    /// # Errors
    /// Returns [`ImageError::InvalidImage`] if the bytes start with neither magic number
    pub fn validate(bytes: &[u8]) -> Result<Self, ImageError> {
        Self::detect(bytes).ok_or(ImageError::InvalidImage)
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Whether `key` has the extension of an accepted format
    #[must_use]
    pub fn is_image_key(key: &str) -> bool {
        let Some((_, ext)) = key.rsplit_once('.') else {
            return false;
        };
        ["jpg", "jpeg", "png"].iter().any(|e| ext.eq_ignore_ascii_case(e))
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}
