//! The transaxial field of view: the cylinder around the rotation axis that
//! every projection sees in full. Voxels outside it are sampled by only
//! part of the views and are unreliable, so reconstructions are usually
//! masked to it before any quantitative comparison.

use crate::error::{Error, Result};
use crate::geometry::ProjectionGeometry;
use crate::projections::ProjectionStack;
use crate::types::Lengthf32;
use crate::volume::Volume;

/// Radius (mm) of the largest cylinder, centred on the rotation axis, that
/// stays inside the fan of every view: `sid · sin(atan(hw / sdd))` with
/// `hw` the tighter of the two offset-corrected detector half-extents,
/// minimized over views.
pub fn transaxial_fov_radius(
    geometry: &ProjectionGeometry,
    projections: &ProjectionStack,
) -> Result<Lengthf32> {
    projections.check_views(geometry.projection_count())?;
    if geometry.projection_count() == 0 {
        return Err(Error::InvalidGeometry("empty geometry has no field of view".into()));
    }
    let u_first = projections.u(0) as f64;
    let u_last  = projections.u(projections.width() - 1) as f64;
    let radius = geometry
        .records()
        .iter()
        .map(|rec| {
            let half_width = (u_first + rec.offset_u)
                .abs()
                .min((u_last + rec.offset_u).abs());
            let sdd = rec.source_to_detector;
            rec.source_to_iso * half_width / (half_width * half_width + sdd * sdd).sqrt()
        })
        .fold(f64::INFINITY, f64::min);
    Ok(radius as Lengthf32)
}

/// Zero every voxel whose centre lies outside the cylinder of the given
/// radius around the rotation (z) axis.
pub fn mask_transaxial_fov(volume: &mut Volume, radius: Lengthf32) {
    let r2 = (radius as f64) * (radius as f64);
    let geometry = volume.geometry;
    for ((iz, iy, ix), voxel) in volume.data.indexed_iter_mut() {
        let p = geometry.voxel_centre([ix, iy, iz]);
        if p.x * p.x + p.y * p.y > r2 {
            *voxel = 0.0;
        }
    }
}
