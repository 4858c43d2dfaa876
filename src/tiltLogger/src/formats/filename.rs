
use std::path::Path;

use anyhow::{Context, Result};


/// marks the filename token that holds the tilt angle, eg. `scan_-10.5degrees_03.tif`
const ANGLE_TOKEN: &str = "degrees";


/// For formats that don't store the stage tilt angle in their metadata,
/// the acquisition software writes it into the filename instead
pub fn angle_from_filename(path: &Path) -> Result<f64> {

	let name = path.file_name()
		.context(format!("Path has no filename: {}", path.to_string_lossy()))?
		.to_string_lossy();

	let token = name.split('_')
		.find(|token| token.contains(ANGLE_TOKEN))
		.context(format!("No '{}' token in filename: {}", ANGLE_TOKEN, name))?;

	// the numeric prefix is the angle
	let prefix = match token.find(ANGLE_TOKEN) {
		Some(i) => &token[.. i],
		None => token
	};
	prefix.parse::<f64>()
		.context(format!("Failed to parse tilt angle '{}' in filename: {}", prefix, name))
}
