//! Circular cone-beam acquisition geometry: one record per view, and the
//! 3×4 projective matrix mapping volume voxel indices to detector pixel
//! indices for a given view.
//!
//! Coordinate conventions, fixed once for the whole crate:
//!
//!   - The gantry rotates about the volume **z** axis.
//!   - At gantry angle 0 the source sits at `(0, -sid, 0)`; the detector
//!     plane is normal to +y at `y = sdd - sid`, with the detector u axis
//!     along +x and v along +z.
//!   - The gantry-to-world rotation is
//!     `Rz(gantry) · Rx(out_of_plane_1) · Rz(out_of_plane_2) · Ry(in_plane)`,
//!     all angles counter-clockwise positive about their axis; the matrix
//!     uses its inverse. Since every factor fixes the origin, the isocenter
//!     always projects to the detector's central pixel when the projection
//!     offsets are zero.
//!
//! The third (homogeneous) row of the projection matrix evaluates to
//! `U = sid + y_gantry`: the distance from the source to the voxel's
//! projection onto the source-detector axis. The backprojector reads its
//! magnification weight straight off the perspective divisor.

use nalgebra::{Matrix3, Matrix3x4, Rotation3, Vector3};

use crate::error::{Error, Result};
use crate::types::TWOPI;

/// Acquisition parameters of a single projection. Distances in mm, angles
/// in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionRecord {
    /// Source-to-isocentre distance (`sid`).
    pub source_to_iso: f64,
    /// Source-to-detector distance (`sdd`); strictly greater than `sid`.
    pub source_to_detector: f64,
    /// Gantry rotation angle, wraps mod 360°.
    pub angle_deg: f64,
    /// Detector shift along u, in mm.
    pub offset_u: f64,
    /// Detector shift along v, in mm.
    pub offset_v: f64,
    /// Rotation of the detector within its own plane.
    pub in_plane_deg: f64,
    /// Detector tilts out of the rotation plane.
    pub out_of_plane1_deg: f64,
    pub out_of_plane2_deg: f64,
}

/// Ordered sequence of per-view acquisition records. Append-only: build it
/// once before reconstructing, then hand it to the stages read-only.
#[derive(Clone, Debug, Default)]
pub struct ProjectionGeometry {
    records: Vec<ProjectionRecord>,
}

impl ProjectionGeometry {
    pub fn new() -> Self { Self { records: vec![] } }

    /// Append one view. Rejects records violating `sdd > sid >= 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_projection(
        &mut self,
        source_to_iso: f64,
        source_to_detector: f64,
        angle_deg: f64,
        offset_u: f64,
        offset_v: f64,
        in_plane_deg: f64,
        out_of_plane1_deg: f64,
        out_of_plane2_deg: f64,
    ) -> Result<()> {
        if source_to_iso < 0.0 || source_to_detector < 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "negative distance: sid = {source_to_iso}, sdd = {source_to_detector}"
            )));
        }
        if source_to_detector <= source_to_iso {
            return Err(Error::InvalidGeometry(format!(
                "source-to-detector distance {source_to_detector} must exceed \
                 source-to-isocentre distance {source_to_iso}"
            )));
        }
        self.records.push(ProjectionRecord {
            source_to_iso,
            source_to_detector,
            angle_deg,
            offset_u,
            offset_v,
            in_plane_deg,
            out_of_plane1_deg,
            out_of_plane2_deg,
        });
        Ok(())
    }

    pub fn projection_count(&self) -> usize { self.records.len() }

    pub fn records(&self) -> &[ProjectionRecord] { &self.records }

    pub fn record(&self, view: usize) -> Result<&ProjectionRecord> {
        self.records.get(view).ok_or_else(|| Error::IndexOutOfRange(format!(
            "view {view} of a geometry with {} projections", self.records.len()
        )))
    }

    /// 3×4 matrix taking homogeneous volume voxel indices to homogeneous
    /// detector pixel indices for the given view. Composition, right to
    /// left: voxel index → physical mm → gantry frame → central projection
    /// onto the detector plane → detector pixel index (projection offsets
    /// included). Recomputed on every call.
    pub fn projection_matrix(
        &self,
        view: usize,
        volume_origin: [f64; 3],
        volume_spacing: [f64; 3],
        detector_origin: [f64; 2],
        detector_spacing: [f64; 2],
    ) -> Result<Matrix3x4<f64>> {
        let rec = self.record(view)?;
        let sid = rec.source_to_iso;
        let sdd = rec.source_to_detector;

        let [ox, oy, oz] = volume_origin;
        let [sx, sy, sz] = volume_spacing;
        #[rustfmt::skip]
        let index_to_world = nalgebra::Matrix4::new(
            sx , 0.0, 0.0, ox ,
            0.0, sy , 0.0, oy ,
            0.0, 0.0, sz , oz ,
            0.0, 0.0, 0.0, 1.0,
        );

        let gantry_to_world =
              Rotation3::from_axis_angle(&Vector3::z_axis(), rec.angle_deg.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), rec.out_of_plane1_deg.to_radians())
            * Rotation3::from_axis_angle(&Vector3::z_axis(), rec.out_of_plane2_deg.to_radians())
            * Rotation3::from_axis_angle(&Vector3::y_axis(), rec.in_plane_deg.to_radians());
        let world_to_gantry = gantry_to_world.inverse().to_homogeneous();

        // Perspective projection from the source at (0, -sid, 0) onto the
        // plane y = sdd - sid. Third row carries U = y + sid.
        #[rustfmt::skip]
        let project = Matrix3x4::new(
            sdd, 0.0, 0.0, 0.0,
            0.0, 0.0, sdd, 0.0,
            0.0, 1.0, 0.0, sid,
        );

        let [du, dv] = detector_spacing;
        let [u0, v0] = detector_origin;
        #[rustfmt::skip]
        let detector_index = Matrix3::new(
            1.0 / du, 0.0     , -(u0 + rec.offset_u) / du,
            0.0     , 1.0 / dv, -(v0 + rec.offset_v) / dv,
            0.0     , 0.0     ,  1.0                     ,
        );

        Ok(detector_index * project * world_to_gantry * index_to_world)
    }

    /// Per-view angular weights for backprojection normalization: half the
    /// angular gap to each neighbouring view, treating the angle sequence
    /// as circular mod 360°. Uniform full-circle sampling gives exactly
    /// `2π/n` per view.
    pub fn angular_weights(&self) -> Vec<f64> {
        let n = self.records.len();
        if n == 0 { return vec![]; }
        if n == 1 { return vec![TWOPI]; }
        let wrap = |a: f64| {
            let a = a.rem_euclid(TWOPI);
            if a == 0.0 { TWOPI } else { a }
        };
        let gap_after: Vec<f64> = (0..n)
            .map(|i| {
                let a = self.records[i].angle_deg.to_radians();
                let b = self.records[(i + 1) % n].angle_deg.to_radians();
                wrap(b - a)
            })
            .collect();
        (0..n)
            .map(|i| 0.5 * (gap_after[(i + n - 1) % n] + gap_after[i]))
            .collect()
    }
}
