//! The FDK pipeline composed into a single entry point: cosine weighting,
//! ramp filtering, weighted backprojection. Plain function composition over
//! value types; callers wanting streamed reconstruction invoke this
//! repeatedly with the sub-regions of `Region::split_z` (or any other
//! disjoint decomposition) and stitch the results.

use crate::backproject::backproject;
use crate::error::Result;
use crate::filter::{filter, RampFilterConfig};
use crate::geometry::ProjectionGeometry;
use crate::projections::ProjectionStack;
use crate::volume::{Region, Volume, VolumeGeometry};
use crate::weighting::weight;

/// Reconstruct the voxels of `region` (a sub-box of the grid described by
/// `volume`) from raw projections. Pure: identical inputs give bit-identical
/// output, and any disjoint region decomposition reproduces the one-shot
/// result voxel for voxel.
pub fn reconstruct(
    projections: &ProjectionStack,
    geometry: &ProjectionGeometry,
    volume: &VolumeGeometry,
    region: Region,
    config: &RampFilterConfig,
) -> Result<Volume> {
    let weighted = weight(projections, geometry)?;
    let filtered = filter(&weighted, config)?;
    backproject(&filtered, geometry, volume, region)
}
