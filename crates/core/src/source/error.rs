use thiserror::Error;

/// Why a source could not be turned into a local file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid image source: {0}")]
    InvalidSource(String),

    #[error("Failed to download image: {0}")]
    Request(String),

    #[error("Failed to download image. HTTP status: {0}")]
    HttpStatus(u16),

    #[error("The file is not a valid image (content type: {})", .0.as_deref().unwrap_or("missing"))]
    NotAnImage(Option<String>),

    #[error("Could not determine the image size")]
    MissingLength,

    #[error("The image exceeds the maximum allowed size ({max_mb} MB)")]
    TooLarge { max_mb: u64 },

    #[error("The downloaded file is empty")]
    Empty,

    #[error("Invalid inline image: {0}")]
    InvalidInline(String),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}
