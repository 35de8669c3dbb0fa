//! Crate-wide error type. Every pipeline stage validates its inputs on
//! entry; the only silently tolerated condition is a voxel whose projected
//! ray leaves the detector extent, which the backprojector treats as an
//! ordinary per-view skip.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid numeric configuration: {0}")]
    NumericConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
