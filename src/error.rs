//! Error types for the gemini-unblend crate.

/// Errors that can occur while loading calibration, unblending, or writing results.
///
/// A missing calibration capture and an overlay rectangle that falls outside the
/// image are not errors: the first yields an all-zero alpha map, the second is
/// clipped to the image bounds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pixel buffer has a zero dimension or a byte length that does not match.
    #[error("invalid pixel buffer ({width}x{height}, {len} bytes)")]
    InvalidInput {
        /// Buffer width in pixels.
        width: u32,
        /// Buffer height in pixels.
        height: u32,
        /// Length of the supplied byte slice.
        len: usize,
    },

    /// A calibration capture file exists but could not be decoded.
    #[error("failed to decode calibration capture: {0}")]
    CalibrationDecode(image::ImageError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A layout file could not be parsed.
    #[error("failed to parse layout: {0}")]
    Config(#[from] serde_json::Error),

    /// A layout file parsed but describes an unusable geometry.
    #[error("invalid layout: {0}")]
    InvalidConfig(String),

    /// Writing the result archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
