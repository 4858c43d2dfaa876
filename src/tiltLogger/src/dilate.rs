
//! Binary dilation of labeled objects in a segmented volume.
//!
//! The structuring element is 3D. Each of its z cross-sections becomes an `imageproc` mask,
//! and an output slice is the union of its neighbor slices dilated by the matching cross-section.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, Mask};
use ndarray::{Array3, Axis};
use tracing::{debug, info};

use crate::error::TiltError;


/// rough share of the work done after each step, in percent
const PROGRESS_CONVERT: u32 = 10;
const PROGRESS_FILTER: u32 = 20;
const PROGRESS_FILTERED: u32 = 90;
const PROGRESS_DONE: u32 = 100;

const MASK_ON: u8 = 255;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
	Box,
	/// voxels within radius + 1/2 of the center
	Ball,
	/// the center, and the voxels along the three axes
	Cross
}

impl StructuringElement {

	pub fn from_id(id: u32) -> Result<Self,TiltError> {
		match id {
			0 => Ok(Self::Box),
			1 => Ok(Self::Ball),
			2 => Ok(Self::Cross),
			_ => Err(TiltError::InvalidKernel(id))
		}
	}

	fn contains(&self, radius: i32, dx: i32, dy: i32, dz: i32) -> bool {
		match self {
			Self::Box => true,
			Self::Ball => 4*(dx*dx + dy*dy + dz*dz) <= (2*radius + 1).pow(2),
			Self::Cross => [dx, dy, dz].iter().filter(|&&d| d != 0).count() <= 1
		}
	}

	/// The cross-sections of the element at z offsets -radius to radius
	fn sections(&self, radius: u8) -> Vec<Mask> {
		let r = radius as i32;
		let side = 2*radius as u32 + 1;
		(-r ..= r)
			.map(|dz| {
				let section = GrayImage::from_fn(side, side, |x, y| {
					if self.contains(r, x as i32 - r, y as i32 - r, dz) {
						Luma([MASK_ON])
					} else {
						Luma([0])
					}
				});
				Mask::from_image(&section, radius, radius)
			})
			.collect()
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct DilateParams<T> {
	pub structuring_element: StructuringElement,
	pub radius: u8,
	/// the label of the objects to grow
	pub object_label: T,
	/// only pixels with this label get overwritten by the growing objects
	pub background_label: T
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dilation {
	Completed,
	/// the progress callback asked to stop, the volume wasn't changed
	Cancelled
}


/// Dilates the objects in a [rows, cols, slices] volume, in place.
///
/// `progress` gets a percentage and a message after each step,
/// returning false from it cancels the dilation.
pub fn dilate<T>(
	volume: &mut Array3<T>,
	params: &DilateParams<T>,
	mut progress: impl FnMut(u32, &str) -> bool
) -> Dilation
	where
		T: Copy + PartialEq
{

	let mut report = |percent: u32, message: &str| -> bool {
		debug!("dilate: {}% {}", percent, message);
		progress(percent, message)
	};

	if !report(PROGRESS_CONVERT, "Converting data to slice masks") {
		return Dilation::Cancelled;
	}

	let (rows, cols, _) = volume.dim();
	let masks = volume.axis_iter(Axis(2))
		.map(|slice| GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
			if slice[[y as usize, x as usize]] == params.object_label {
				Luma([MASK_ON])
			} else {
				Luma([0])
			}
		}))
		.collect::<Vec<_>>();

	if !report(PROGRESS_FILTER, "Running filter") {
		return Dilation::Cancelled;
	}

	let sections = params.structuring_element.sections(params.radius);
	let radius = params.radius as usize;
	let num_slices = masks.len() as u32;
	let mut dilated = Vec::with_capacity(masks.len());
	for i in 0 .. masks.len() {

		let mut slice_mask = GrayImage::new(cols as u32, rows as u32);
		for (k, section) in sections.iter().enumerate() {
			// the element is symmetric, so the neighbor at z offset k - radius uses the same section
			let Some(z) = (i + k).checked_sub(radius)
				else { continue; };
			let Some(neighbor) = masks.get(z)
				else { continue; };
			let grown = grayscale_dilate(neighbor, section);
			for (dst, src) in slice_mask.pixels_mut().zip(grown.pixels()) {
				dst[0] = dst[0].max(src[0]);
			}
		}
		dilated.push(slice_mask);

		let percent = PROGRESS_FILTER + (PROGRESS_FILTERED - PROGRESS_FILTER)*(i as u32 + 1)/num_slices;
		if !report(percent, "Running filter") {
			return Dilation::Cancelled;
		}
	}

	if !report(PROGRESS_FILTERED, "Saving results") {
		return Dilation::Cancelled;
	}

	let mut num_changed = 0usize;
	for (mut slice, mask) in volume.axis_iter_mut(Axis(2)).zip(&dilated) {
		for ((y, x), v) in slice.indexed_iter_mut() {
			if mask.get_pixel(x as u32, y as u32)[0] == MASK_ON && *v == params.background_label {
				*v = params.object_label;
				num_changed += 1;
			}
		}
	}

	report(PROGRESS_DONE, "Done");
	info!("Dilated {:?} objects by {}, {} voxel(s) changed", params.structuring_element, params.radius, num_changed);

	Dilation::Completed
}
