
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;

use super::{ProjectionImage, ProjectionReader};
use super::filename::angle_from_filename;


/// Reads plain raster images (eg. TIFF exports from the microscope) as grayscale.
/// These carry no stage metadata, so the tilt angle always comes from the filename.
pub struct RasterReader;

impl ProjectionReader for RasterReader {

	fn read(&self, path: &Path) -> Result<ProjectionImage> {

		let img = image::open(path)
			.context(format!("Failed to decode image: {}", path.to_string_lossy()))?
			.to_luma32f();

		let (width, height) = img.dimensions();
		let image = Array2::from_shape_vec((height as usize, width as usize), img.into_raw())
			.context("Failed to shape image pixels")?;

		Ok(ProjectionImage {
			image,
			tilt_angle: angle_from_filename(path)?
		})
	}
}
