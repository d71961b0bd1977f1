//! Error types for isosurface extraction

use thiserror::Error;

/// Errors that can occur while loading a field or extracting a surface
#[derive(Error, Debug)]
pub enum VoronoiError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The point set handed to the geometry kernel cannot be triangulated,
    /// or a Voronoi cell that must be bounded is not
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// Output format or file encoding is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Scalar element type of the input volume is not supported
    #[error("unsupported element type: {0}")]
    UnsupportedElementType(String),

    /// Input volume header or payload is malformed
    #[error("parse error: {0}")]
    Parse(String),

    /// IO error; see inner error for details
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, VoronoiError>;
