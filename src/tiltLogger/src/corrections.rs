
//! Image corrections applied to every projection before it joins the tilt stack.

use ndarray::{s, Array2};

use crate::error::TiltError;


/// the background block is this fraction of the image along each axis
const BACKGROUND_FRACTION: usize = 16;


/// Removes the sensor background offset.
///
/// The top-left corner block, `(Nx/16) x (Ny/16)` pixels, is assumed to lie outside the specimen.
/// Its mean is subtracted from the whole image and negative pixels are clamped to zero.
/// Images smaller than 16 pixels along an axis have an empty block, and are only clamped.
///
/// Not idempotent: a second pass subtracts the new corner mean, unless that is already zero.
pub fn background_subtract(image: &mut Array2<f32>) -> Result<(), TiltError> {

	let (nx, ny) = image.dim();
	if nx == 0 || ny == 0 {
		return Err(TiltError::DegenerateImage("image has no pixels".to_string()));
	}

	let block = image.slice(s![.. nx/BACKGROUND_FRACTION, .. ny/BACKGROUND_FRACTION]);
	let background = block.mean()
		.unwrap_or(0.0);
	if !background.is_finite() {
		return Err(TiltError::DegenerateImage(format!("background intensity is {}", background)));
	}

	image.mapv_inplace(|v| (v - background).max(0.0));

	Ok(())
}


/// The intensity-weighted centroid `(cx, cy)`, in pixel indices along axes 0 and 1
pub fn center_of_mass(image: &Array2<f32>) -> Result<(f64, f64), TiltError> {

	let mut total = 0f64;
	let mut sum_x = 0f64;
	let mut sum_y = 0f64;
	for ((x, y), &v) in image.indexed_iter() {
		let v = v as f64;
		total += v;
		sum_x += v*(x as f64);
		sum_y += v*(y as f64);
	}

	if total == 0.0 || !total.is_finite() {
		return Err(TiltError::DegenerateImage(format!("total intensity is {}, center of mass is undefined", total)));
	}

	Ok((sum_x/total, sum_y/total))
}


/// Compensates for specimen drift between tilts: cyclically shifts the image
/// so its center of mass (truncated to whole pixels) lands on `(Nx/2, Ny/2)`
pub fn center_of_mass_align(image: &Array2<f32>) -> Result<Array2<f32>, TiltError> {

	let (nx, ny) = image.dim();
	let (cx, cy) = center_of_mass(image)?;

	let shift_x = (nx/2) as isize - cx as isize;
	let shift_y = (ny/2) as isize - cy as isize;

	Ok(roll(image, shift_x, shift_y))
}


/// Shifts the image with wrap-around, so pixel `(x, y)` moves to `(x + shift_x, y + shift_y)`
pub fn roll(image: &Array2<f32>, shift_x: isize, shift_y: isize) -> Array2<f32> {
	let (nx, ny) = image.dim();
	Array2::from_shape_fn((nx, ny), |(x, y)| {
		let src_x = (x as isize - shift_x).rem_euclid(nx as isize) as usize;
		let src_y = (y as isize - shift_y).rem_euclid(ny as isize) as usize;
		image[[src_x, src_y]]
	})
}
