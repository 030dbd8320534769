//! Error types for rasterzones

use thiserror::Error;

/// Main error type for rasterzones operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Affine transform is not invertible (determinant {determinant})")]
    InvalidTransform { determinant: f64 },

    #[error("Invalid geometry '{name}': {reason}")]
    InvalidGeometry { name: String, reason: String },

    #[error("Duplicate shape name: {0}")]
    DuplicateName(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Cannot subdivide '{name}': {reason}")]
    Subdivision { name: String, reason: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn geometry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidGeometry {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Build a subdivision failure for the named parent shape.
    pub fn subdivision(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Subdivision {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Format(e.to_string())
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Format(format!("TIFF decode error: {}", e))
    }
}

/// Result type alias for rasterzones operations
pub type Result<T> = std::result::Result<T, Error>;
