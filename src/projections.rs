//! A stack of 2D projection images: one detector image per view, addressed
//! by (x, y, view). Produced by acquisition or simulation, consumed by the
//! weighting and filtering stages and finally by the backprojector.

use ndarray::{Array3, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::types::Lengthf32;

/// Detector intensities stored `[view, y, x]`, x contiguous along detector
/// rows, together with the detector sampling grid. `origin` is the physical
/// position (mm) of the centre of pixel (0, 0) in detector (u, v)
/// coordinates; the detector centre is at (0, 0).
#[derive(Clone, Debug)]
pub struct ProjectionStack {
    pub data: Array3<f32>,
    pub origin: [Lengthf32; 2],
    pub spacing: [Lengthf32; 2],
}

impl ProjectionStack {
    pub fn new(data: Array3<f32>, origin: [Lengthf32; 2], spacing: [Lengthf32; 2]) -> Self {
        Self { data, origin, spacing }
    }

    pub fn zeros(
        (width, height, views): (usize, usize, usize),
        origin: [Lengthf32; 2],
        spacing: [Lengthf32; 2],
    ) -> Self {
        Self::new(Array3::zeros((views, height, width)), origin, spacing)
    }

    pub fn views(&self)  -> usize { self.data.len_of(Axis(0)) }
    pub fn height(&self) -> usize { self.data.len_of(Axis(1)) }
    pub fn width(&self)  -> usize { self.data.len_of(Axis(2)) }

    pub fn view(&self, i: usize) -> Result<ArrayView2<f32>> {
        if i >= self.views() {
            return Err(Error::IndexOutOfRange(format!(
                "view {i} of a stack with {} projections", self.views()
            )));
        }
        Ok(self.data.index_axis(Axis(0), i))
    }

    /// Physical u coordinate of the centre of pixel column `x`.
    pub fn u(&self, x: usize) -> Lengthf32 { self.origin[0] + x as f32 * self.spacing[0] }

    /// Physical v coordinate of the centre of pixel row `y`.
    pub fn v(&self, y: usize) -> Lengthf32 { self.origin[1] + y as f32 * self.spacing[1] }

    /// Fail with `ShapeMismatch` unless the stack holds one image per view
    /// of `geometry`.
    pub(crate) fn check_views(&self, expected: usize) -> Result<()> {
        if self.views() != expected {
            return Err(Error::ShapeMismatch(format!(
                "projection stack has {} views but the geometry has {expected}",
                self.views()
            )));
        }
        Ok(())
    }
}
