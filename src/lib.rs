pub mod types;
pub mod error;
pub mod geometry;
pub mod projections;
pub mod volume;
pub mod weighting;
pub mod filter;
pub mod backproject;
pub mod fdk;
pub mod fov;
pub mod fom;

pub use error::{Error, Result};
pub use fdk::reconstruct;
