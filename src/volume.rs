//! The reconstruction volume: a voxel grid described by origin, spacing and
//! voxel counts, its intensity data, and axis-aligned sub-regions for
//! region-decomposed (streamed) reconstruction.

use nalgebra::Point3;
use ndarray::Array3;

use crate::error::{Error, Result};
use crate::types::{Intensityf32, Lengthf32};

/// Size and granularity of the voxel grid in which images are
/// reconstructed. `origin` is the physical position (mm) of the centre of
/// voxel (0, 0, 0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeGeometry {
    pub n: [usize; 3],
    pub origin: [Lengthf32; 3],
    pub spacing: [Lengthf32; 3],
}

impl VolumeGeometry {
    pub fn new(n: [usize; 3], origin: [Lengthf32; 3], spacing: [Lengthf32; 3]) -> Self {
        Self { n, origin, spacing }
    }

    /// Physical centre of the voxel with the given (absolute) index.
    /// Computed in f64 so that the same absolute index yields bit-identical
    /// coordinates whichever sub-region it is visited through.
    pub fn voxel_centre(&self, [ix, iy, iz]: [usize; 3]) -> Point3<f64> {
        Point3::new(
            self.origin[0] as f64 + ix as f64 * self.spacing[0] as f64,
            self.origin[1] as f64 + iy as f64 * self.spacing[1] as f64,
            self.origin[2] as f64 + iz as f64 * self.spacing[2] as f64,
        )
    }

    pub fn full_region(&self) -> Region {
        Region { offset: [0; 3], size: self.n }
    }

    /// The geometry of a sub-region of this grid: same spacing, origin
    /// shifted to the region's first voxel.
    pub fn region_geometry(&self, region: Region) -> VolumeGeometry {
        let origin = std::array::from_fn(|a| {
            self.origin[a] + region.offset[a] as f32 * self.spacing[a]
        });
        VolumeGeometry { n: region.size, origin, spacing: self.spacing }
    }
}

/// An axis-aligned box of voxel indices within a full volume extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub offset: [usize; 3],
    pub size: [usize; 3],
}

impl Region {
    pub fn contained_in(&self, n: [usize; 3]) -> bool {
        (0..3).all(|a| self.offset[a] + self.size[a] <= n[a])
    }

    /// Split into `parts` z-slabs of near-equal thickness, for drivers that
    /// reconstruct a volume piecewise. Slabs cover the region exactly and
    /// do not overlap; empty slabs are omitted when `parts > nz`.
    pub fn split_z(&self, parts: usize) -> Vec<Region> {
        let nz = self.size[2];
        let parts = parts.max(1);
        let base = nz / parts;
        let extra = nz % parts;
        let mut slabs = Vec::with_capacity(parts.min(nz));
        let mut z = self.offset[2];
        for p in 0..parts {
            let thickness = base + usize::from(p < extra);
            if thickness == 0 { continue; }
            slabs.push(Region {
                offset: [self.offset[0], self.offset[1], z],
                size: [self.size[0], self.size[1], thickness],
            });
            z += thickness;
        }
        slabs
    }
}

/// A voxel grid together with its intensity data, stored `[z, y, x]`.
#[derive(Clone, Debug)]
pub struct Volume {
    pub geometry: VolumeGeometry,
    pub data: Array3<Intensityf32>,
}

impl Volume {
    pub fn new(geometry: VolumeGeometry, data: Array3<Intensityf32>) -> Result<Self> {
        let [nx, ny, nz] = geometry.n;
        if data.dim() != (nz, ny, nx) {
            return Err(Error::ShapeMismatch(format!(
                "volume data of shape {:?} does not match voxel counts {:?}",
                data.dim(), geometry.n
            )));
        }
        Ok(Self { geometry, data })
    }

    pub fn zeros(geometry: VolumeGeometry) -> Self {
        let [nx, ny, nz] = geometry.n;
        Self { geometry, data: Array3::zeros((nz, ny, nx)) }
    }
}
