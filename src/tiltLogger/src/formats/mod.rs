
//! Format readers turn a microscope image file into a projection image and its tilt angle.

pub mod mrc;
pub mod raster;
pub mod filename;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use ndarray::Array2;

use crate::error::TiltError;


/// One 2D projection of the specimen, and the stage tilt angle it was taken at
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionImage {
	pub image: Array2<f32>,
	/// in degrees
	pub tilt_angle: f64
}


pub trait ProjectionReader {
	fn read(&self, path: &Path) -> Result<ProjectionImage>;
}

/// Lets hosts plug in a reader for a format we don't parse ourselves, eg. dm4
impl<F> ProjectionReader for F
	where
		F: Fn(&Path) -> Result<ProjectionImage>
{
	fn read(&self, path: &Path) -> Result<ProjectionImage> {
		self(path)
	}
}


/// Format readers, keyed by file extension
pub struct Readers {
	readers: HashMap<String,Box<dyn ProjectionReader>>
}

impl Readers {

	pub fn new() -> Self {
		Self {
			readers: HashMap::new()
		}
	}

	/// All the formats we can read on our own.
	/// The Gatan (dm3, dm4) and FEI (ser) formats aren't among them, register a reader for those.
	pub fn builtin() -> Self {
		let mut readers = Self::new();
		for ext in ["mrc", "st", "ali"] {
			readers.register(ext, mrc::MrcReader);
		}
		for ext in ["tif", "tiff", "png"] {
			readers.register(ext, raster::RasterReader);
		}
		readers
	}

	pub fn register(&mut self, extension: impl AsRef<str>, reader: impl ProjectionReader + 'static) {
		self.readers.insert(normalize_extension(extension), Box::new(reader));
	}

	pub fn supports(&self, extension: impl AsRef<str>) -> bool {
		self.readers.contains_key(&normalize_extension(extension))
	}

	/// Picks the reader for the extension, the rest are dropped
	pub fn select(mut self, extension: impl AsRef<str>) -> Result<Box<dyn ProjectionReader>,TiltError> {
		let extension = extension.as_ref();
		self.readers.remove(&normalize_extension(extension))
			.ok_or_else(|| TiltError::UnsupportedFormat(extension.to_string()))
	}
}


/// lower-case, and without any leading dot
pub fn normalize_extension(extension: impl AsRef<str>) -> String {
	extension.as_ref()
		.trim_start_matches('.')
		.to_lowercase()
}
