//! Figures of merit comparing a reconstruction against a reference volume.

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Summary statistics of the voxelwise difference between two volumes.
#[derive(Clone, Copy, Debug)]
pub struct ImageQuality {
    /// Mean absolute error per voxel.
    pub error_per_pixel: f64,
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB, for a signal peak of 2.
    pub psnr: f64,
    /// Quality index `(2 - error_per_pixel) / 2`.
    pub qi: f64,
}

pub fn image_quality(recon: &Volume, reference: &Volume) -> Result<ImageQuality> {
    if recon.geometry.n != reference.geometry.n {
        return Err(Error::ShapeMismatch(format!(
            "cannot compare volumes of {:?} and {:?} voxels",
            recon.geometry.n, reference.geometry.n
        )));
    }
    let mut abs_error = 0.0;
    let mut sq_error = 0.0;
    for (&t, &r) in recon.data.iter().zip(reference.data.iter()) {
        let d = (r - t) as f64;
        abs_error += d.abs();
        sq_error += d * d;
    }
    let voxels = recon.data.len() as f64;
    let error_per_pixel = abs_error / voxels;
    let mse = sq_error / voxels;
    let psnr = 20.0 * 2.0f64.log10() - 10.0 * mse.log10();
    Ok(ImageQuality { error_per_pixel, mse, psnr, qi: (2.0 - error_per_pixel) / 2.0 })
}
