
//! Hands an assembled tilt series to a reconstruction.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use ndarray::{Array2, Array3, ArrayView3, Axis};
use tracing::info;

use crate::error::TiltError;
use crate::mrc::Mrc;
use crate::watcher::TiltSeries;


/// The real-time reconstruction algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
	/// Weighted Back-Projection, the only one that takes the stack and angles as-is
	Wbp,
	Art,
	Sirt,
	Sart,
	Dft
}

impl Algorithm {

	pub const ALL: [Algorithm; 5] = [Self::Wbp, Self::Art, Self::Sirt, Self::Sart, Self::Dft];

	pub fn name(&self) -> &'static str {
		match self {
			Self::Wbp => "WBP",
			Self::Art => "ART",
			Self::Sirt => "SIRT",
			Self::Sart => "SART",
			Self::Dft => "DFT"
		}
	}
}

impl fmt::Display for Algorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Algorithm {
	type Err = TiltError;

	fn from_str(s: &str) -> Result<Self,Self::Err> {
		Self::ALL.into_iter()
			.find(|alg| alg.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| TiltError::InvalidAlgorithm(s.to_string()))
	}
}


/// The tilt series, in the layout the reconstruction algorithm wants
#[derive(Debug, Clone, PartialEq)]
pub enum TiltSeriesExport {

	/// for WBP: the [rows, cols, frames] stack, and one angle per frame
	Stack {
		stack: Array3<f32>,
		angles: Vec<f64>
	},

	/// for everything else: [slices, rays*frames]
	Matrix(Array2<f32>)
}


pub trait ReconstructionConsumer {
	fn set_tilt_series(&mut self, series: TiltSeriesExport) -> anyhow::Result<()>;
}


pub fn export_tilt_series(
	series: &TiltSeries,
	target: &mut dyn ReconstructionConsumer,
	algorithm: Algorithm
) -> Result<(),TiltError> {

	if series.is_empty() {
		return Err(TiltError::EmptySeries);
	}

	let export = match algorithm {
		Algorithm::Wbp => TiltSeriesExport::Stack {
			stack: series.stack().clone(),
			angles: series.angles().to_vec()
		},
		_ => TiltSeriesExport::Matrix(flatten_tilt_series(series.stack().view()))
	};

	info!("Exporting {} projection(s) for {}", series.len(), algorithm);

	target.set_tilt_series(export)
		.map_err(TiltError::Export)
}


/// Reshapes a [slices, rays, frames] stack so row `s` is `stack[s, :, :]` transposed and flattened,
/// ie. all the rays of frame 0, then all the rays of frame 1, and so on
pub fn flatten_tilt_series(stack: ArrayView3<f32>) -> Array2<f32> {
	let (slices, rays, frames) = stack.dim();
	Array2::from_shape_fn((slices, rays*frames), |(s, i)| stack[[s, i % rays, i/rays]])
}


/// Writes the exported series as an MRC file.
/// Stacks keep their angles in the extended header, and in a `.rawtlt` file next to the MRC file.
pub struct MrcExport {
	path: PathBuf
}

impl MrcExport {

	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into()
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn angles_path(&self) -> PathBuf {
		self.path.with_extension("rawtlt")
	}
}

impl ReconstructionConsumer for MrcExport {

	fn set_tilt_series(&mut self, series: TiltSeriesExport) -> anyhow::Result<()> {

		match series {

			TiltSeriesExport::Stack { stack, angles } => {

				let mut mrc = Mrc::from_stack(stack.view());
				mrc.set_tilt_angles(angles.clone())?;
				mrc.save(&self.path)?;

				// one angle per line, the IMOD convention
				let angles_path = self.angles_path();
				let text = angles.iter()
					.map(|angle| format!("{:.2}\n", angle))
					.collect::<String>();
				fs::write(&angles_path, text)
					.context(format!("Failed to write tilt angles: {}", angles_path.to_string_lossy()))?;
				info!("Wrote tilt angles: {}", angles_path.to_string_lossy());
			}

			TiltSeriesExport::Matrix(matrix) => {
				let section = matrix.insert_axis(Axis(2));
				Mrc::from_stack(section.view())
					.save(&self.path)?;
			}
		}

		info!("Wrote tilt series: {}", self.path.to_string_lossy());

		Ok(())
	}
}
