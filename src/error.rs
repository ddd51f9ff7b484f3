//! Error types for the QR render lifecycle

use thiserror::Error;

/// Result type alias for rendering and export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or exporting a QR code
#[derive(Error, Debug)]
pub enum Error {
    /// The node handed to `append` cannot hold child nodes
    #[error("Container should be a single DOM node: {0}")]
    InvalidContainer(String),

    /// Export requested before any render cycle started
    #[error("Drawing operation is not available")]
    NotReady,

    /// A draw operation resolved but no surface was tracked afterwards
    #[error("Surface is not initialized")]
    SurfaceMissing,

    /// The symbol encoder rejected the input
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Failed to encode surface pixels into the requested format
    #[error("Export failed: {0}")]
    Export(String),

    /// A download could not be handed to the host
    #[error("Download failed: {0}")]
    Download(String),

    /// I/O error from a download handler
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Export(err.to_string())
    }
}

#[cfg(feature = "qrcode-encoder")]
impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Error::Encode(err.to_string())
    }
}
