
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::mrc::Mrc;
use super::{ProjectionImage, ProjectionReader};
use super::filename::angle_from_filename;


/// Reads the first section of an MRC file.
/// The tilt angle comes from the IMOD extended header if the file has one, or else the filename.
pub struct MrcReader;

impl ProjectionReader for MrcReader {

	fn read(&self, path: &Path) -> Result<ProjectionImage> {

		let mrc = Mrc::read(path)?;
		if mrc.nz() > 1 {
			debug!("{} has {} sections, using only the first one", path.to_string_lossy(), mrc.nz());
		}
		let image = mrc.section(0)
			.context(format!("MRC file has no image: {}", path.to_string_lossy()))?;

		let tilt_angle = match mrc.tilt_angle(0) {
			Some(angle) => angle,
			None => angle_from_filename(path)?
		};

		Ok(ProjectionImage {
			image,
			tilt_angle
		})
	}
}
