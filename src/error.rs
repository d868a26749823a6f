//! Error types for the flag-border-detection crate.

/// Errors that can occur during border detection and file processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input image is empty, has a zero dimension, or cannot be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// A tuning parameter is out of range, or a derived strip size is zero.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An arithmetic domain error inside the pipeline (e.g. statistics of an empty strip).
    #[error("internal computation error: {0}")]
    Computation(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while encoding or saving an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A label or configuration file could not be parsed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the error stems from an input too small for the configured strips.
    ///
    /// Callers use this to apply an "assume no border" policy instead of failing.
    #[must_use]
    pub fn is_degenerate_shape(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter {
                name: "edge_strip" | "narrow_edge_strip",
                ..
            }
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
