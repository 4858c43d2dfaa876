
// Test projections are tiny text files, so tests can make them, break them, and fix them:
//   "<angle> <rows> <cols> <x> <y>" is an image with a single unit of mass at (x, y)
//   "<angle> <rows> <cols> nan" is an image full of NaNs

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use tilt_logger::formats::{ProjectionImage, Readers};
use tilt_logger::watcher::WatchConfig;


pub fn point_image(shape: (usize, usize), point: (usize, usize)) -> Array2<f32> {
	let mut image = Array2::zeros(shape);
	image[[point.0, point.1]] = 1.0;
	image
}


pub fn write_point(dir: &Path, name: &str, angle: f64, shape: (usize, usize), point: (usize, usize)) {
	write(dir, name, format!("{} {} {} {} {}", angle, shape.0, shape.1, point.0, point.1));
}


pub fn write_nan(dir: &Path, name: &str, shape: (usize, usize)) {
	write(dir, name, format!("0 {} {} nan", shape.0, shape.1));
}


pub fn write_garbage(dir: &Path, name: &str) {
	write(dir, name, "not a projection".to_string());
}


fn write(dir: &Path, name: &str, content: String) {
	let path = dir.join(name);
	fs::write(&path, content)
		.expect(&format!("Failed to write: {}", path.to_string_lossy()));
}


pub fn text_reader(path: &Path) -> Result<ProjectionImage> {

	let text = fs::read_to_string(path)?;
	let tokens = text.split_whitespace()
		.collect::<Vec<_>>();

	let (angle, rows, cols) = match tokens.as_slice() {
		[angle, rows, cols, ..] => (
			angle.parse::<f64>().context("bad angle")?,
			rows.parse::<usize>().context("bad rows")?,
			cols.parse::<usize>().context("bad cols")?
		),
		_ => bail!("not enough tokens")
	};

	let image = match &tokens[3 ..] {
		["nan"] => Array2::from_elem((rows, cols), f32::NAN),
		[x, y] => point_image((rows, cols), (x.parse()?, y.parse()?)),
		_ => bail!("bad image")
	};

	Ok(ProjectionImage {
		image,
		tilt_angle: angle
	})
}


pub fn readers(extension: &str) -> Readers {
	let mut readers = Readers::new();
	readers.register(extension, text_reader);
	readers
}


/// checks the directory every few ms instead of every second
pub fn config(dir: &Path, extension: &str) -> WatchConfig {
	let mut config = WatchConfig::new(dir, extension);
	config.poll_interval = Duration::from_millis(10);
	config
}
