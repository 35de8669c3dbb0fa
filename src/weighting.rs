//! Cone-beam pre-weighting: before ramp filtering, each projection pixel is
//! scaled down according to the obliquity of its ray, compensating for the
//! longer path lengths seen away from the central axis.

use ndarray::Axis;
use rayon::prelude::*;

use crate::error::Result;
use crate::geometry::ProjectionGeometry;
use crate::projections::ProjectionStack;

/// Scale every pixel of every view by `sid / sqrt(sdd² + u² + v²)`, with
/// (u, v) the pixel's physical position relative to the beam axis: the
/// local detector grid coordinate plus the view's projection offset, the
/// same mapping the projection matrix uses. Pure: the input stack is left
/// untouched.
pub fn weight(stack: &ProjectionStack, geometry: &ProjectionGeometry) -> Result<ProjectionStack> {
    stack.check_views(geometry.projection_count())?;
    log::debug!(
        "pre-weighting {} projections of {}x{} pixels",
        stack.views(), stack.width(), stack.height()
    );

    let mut out = stack.clone();
    let records = geometry.records();
    out.data
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(records.par_iter())
        .for_each(|(mut image, rec)| {
            let sid = rec.source_to_iso;
            let sdd = rec.source_to_detector;
            for (y, mut row) in image.outer_iter_mut().enumerate() {
                let v = (stack.origin[1] + y as f32 * stack.spacing[1]) as f64 + rec.offset_v;
                let sdd2_v2 = sdd * sdd + v * v;
                for (x, pixel) in row.iter_mut().enumerate() {
                    let u = (stack.origin[0] + x as f32 * stack.spacing[0]) as f64 + rec.offset_u;
                    *pixel *= (sid / (sdd2_v2 + u * u).sqrt()) as f32;
                }
            }
        });
    Ok(out)
}
