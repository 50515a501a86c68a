//! Error types for capture and archive operations

use thiserror::Error;

/// Result type alias for capture and archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing pages or building archives
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize a page surface
    #[error("Surface initialization failed: {0}")]
    InitializationError(String),

    /// The page reported dimensions that cannot be captured
    #[error("Invalid page metrics: {0}")]
    InvalidMetrics(String),

    /// Scrolling the page failed
    #[error("Scroll failed: {0}")]
    ScrollError(String),

    /// Capturing the visible viewport failed
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Decoding, stitching or encoding a raster failed
    #[error("Image processing failed: {0}")]
    ImageError(String),

    /// The scroll offset could not be restored after a capture
    #[error("Failed to restore scroll position to {offset}: {reason}")]
    RestoreError { offset: u32, reason: String },

    /// The page URL cannot be captured (browser-internal pages)
    #[error("Cannot capture restricted page: {0}")]
    RestrictedUrl(String),

    /// Two archive entries share a name
    #[error("Duplicate archive entry name: {0}")]
    DuplicateEntry(String),

    /// Archive entry name is empty or too long for the ZIP header
    #[error("Invalid archive entry name {name:?}: {reason}")]
    InvalidEntryName { name: String, reason: String },

    /// Archive exceeds the limits of the non-ZIP64 format
    #[error("Archive too large: {0}")]
    ArchiveTooLarge(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error while persisting output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err.to_string())
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
