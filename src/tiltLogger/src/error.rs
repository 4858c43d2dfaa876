
use std::io;
use std::path::PathBuf;


/// Everything that can go wrong while watching, ingesting, exporting or dilating
#[derive(Debug, thiserror::Error)]
pub enum TiltError {

	/// the listen directory could not be created, read, or listed
	#[error("Failed to access listen directory: {}", path.to_string_lossy())]
	DirectoryAccess {
		path: PathBuf,
		#[source]
		source: io::Error
	},

	#[error("Unsupported file extension: {0}")]
	UnsupportedFormat(String),

	#[error("Failed to read projection image: {}", path.to_string_lossy())]
	ImageRead {
		path: PathBuf,
		#[source]
		source: anyhow::Error
	},

	/// the image can't be corrected, eg. it has no intensity to take a center of mass from
	#[error("Degenerate image: {0}")]
	DegenerateImage(String),

	#[error("Unknown reconstruction algorithm: {0}")]
	InvalidAlgorithm(String),

	#[error("Image shape {found:?} does not match the tilt stack shape {expected:?}")]
	ShapeMismatch {
		expected: (usize, usize),
		found: (usize, usize)
	},

	#[error("Tilt series has no images")]
	EmptySeries,

	#[error("Invalid kernel shape id {0}")]
	InvalidKernel(u32),

	#[error("Failed to export tilt series")]
	Export(#[source] anyhow::Error)
}
