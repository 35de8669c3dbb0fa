//! Test support: an analytic ellipsoid phantom. Projections are exact
//! cone-beam line integrals (chords through each ellipsoid), so a
//! reconstruction can be compared against the voxelized phantom without
//! any simulated-forward-projection bias.

use ndarray::Array3;

use feldkamp::geometry::ProjectionGeometry;
use feldkamp::projections::ProjectionStack;
use feldkamp::volume::{Volume, VolumeGeometry};

#[derive(Clone, Copy, Debug)]
pub struct Ellipsoid {
    pub centre: [f64; 3],
    pub semi_axes: [f64; 3],
    pub density: f64,
}

impl Ellipsoid {
    /// Length of the intersection of the ray `origin + t·direction` with
    /// this ellipsoid, in the units of `origin` (direction need not be
    /// normalized).
    fn chord(&self, origin: [f64; 3], direction: [f64; 3]) -> f64 {
        // Scale to the unit sphere, solve the quadratic |q0 + t e|² = 1.
        let mut a = 0.0;
        let mut b = 0.0;
        let mut c = -1.0;
        let mut d2 = 0.0;
        for axis in 0..3 {
            let q = (origin[axis] - self.centre[axis]) / self.semi_axes[axis];
            let e = direction[axis] / self.semi_axes[axis];
            a += e * e;
            b += q * e;
            c += q * q;
            d2 += direction[axis] * direction[axis];
        }
        let discriminant = b * b - a * c;
        if discriminant <= 0.0 {
            return 0.0;
        }
        // |t2 - t1| in ray parameter, times the real-space direction length.
        2.0 * discriminant.sqrt() / a * d2.sqrt()
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        (0..3)
            .map(|axis| {
                let q = (p[axis] - self.centre[axis]) / self.semi_axes[axis];
                q * q
            })
            .sum::<f64>() <= 1.0
    }
}

/// A smooth head-like test object: an outer shell of unit density, a less
/// dense interior and two small inserts. Fits inside the 124 mm transaxial
/// field of view of the standard scenario with margin.
pub fn phantom() -> Vec<Ellipsoid> {
    vec![
        Ellipsoid { centre: [0., 0., 0.],      semi_axes: [105., 110., 90.], density:  1.0 },
        Ellipsoid { centre: [0., 0., 0.],      semi_axes: [82., 88., 70.],   density: -0.7 },
        Ellipsoid { centre: [25., -15., 10.],  semi_axes: [25., 25., 25.],   density:  0.4 },
        Ellipsoid { centre: [-35., 28., -20.], semi_axes: [16., 20., 18.],   density:  0.35 },
    ]
}

/// Analytic cone-beam projections of `ellipsoids` for every view of
/// `geometry`, on a detector of `width`×`height` pixels with the given
/// origin and spacing (as in `ProjectionStack`). Supports the circular
/// trajectory used by the tests: gantry angle and projection offsets, no
/// detector tilts.
pub fn project_phantom(
    ellipsoids: &[Ellipsoid],
    geometry: &ProjectionGeometry,
    (width, height): (usize, usize),
    origin: [f32; 2],
    spacing: [f32; 2],
) -> ProjectionStack {
    let views = geometry.projection_count();
    let mut data = Array3::zeros((views, height, width));
    for (view, rec) in geometry.records().iter().enumerate() {
        let beta = rec.angle_deg.to_radians();
        let (sin, cos) = beta.sin_cos();
        // Gantry coordinates (u, d, v) → world: rotation about z.
        let to_world = |u: f64, d: f64, v: f64| [u * cos - d * sin, u * sin + d * cos, v];
        let source = to_world(0.0, -rec.source_to_iso, 0.0);
        let detector_distance = rec.source_to_detector - rec.source_to_iso;
        for y in 0..height {
            let v = (origin[1] + y as f32 * spacing[1]) as f64 + rec.offset_v;
            for x in 0..width {
                let u = (origin[0] + x as f32 * spacing[0]) as f64 + rec.offset_u;
                let pixel = to_world(u, detector_distance, v);
                let direction = [
                    pixel[0] - source[0],
                    pixel[1] - source[1],
                    pixel[2] - source[2],
                ];
                let integral: f64 = ellipsoids
                    .iter()
                    .map(|e| e.density * e.chord(source, direction))
                    .sum();
                data[[view, y, x]] = integral as f32;
            }
        }
    }
    ProjectionStack::new(data, origin, spacing)
}

/// Voxelize `ellipsoids` on the given grid by testing each voxel centre.
pub fn draw_phantom(ellipsoids: &[Ellipsoid], geometry: &VolumeGeometry) -> Volume {
    let mut volume = Volume::zeros(*geometry);
    for ((iz, iy, ix), voxel) in volume.data.indexed_iter_mut() {
        let p = geometry.voxel_centre([ix, iy, iz]);
        let p = [p.x, p.y, p.z];
        *voxel = ellipsoids
            .iter()
            .filter(|e| e.contains(p))
            .map(|e| e.density)
            .sum::<f64>() as f32;
    }
    volume
}
