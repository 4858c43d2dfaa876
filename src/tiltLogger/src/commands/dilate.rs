
use anyhow::{bail, Context, Result};
use gumdrop::Options;

use crate::dilate::{dilate, DilateParams, Dilation, StructuringElement};
use crate::mrc::Mrc;


#[derive(Options)]
pub struct Args {

	/// The structuring element: 0 = box, 1 = ball, 2 = cross
	#[options(no_short, default = "0")]
	kernel: u32,

	/// Radius of the structuring element, in pixels
	#[options(no_short, default = "1")]
	radius: u8,

	/// Label of the objects to dilate
	#[options(no_short, default = "1")]
	object: f32,

	/// Label of the background the objects may grow into
	#[options(no_short, default = "0")]
	background: f32,

	/// The segmented MRC volume to read
	#[options(free, required)]
	input: String,

	/// Where to write the dilated MRC volume
	#[options(free, required)]
	output: String
}


pub fn run(quiet: bool, args: Args) -> Result<()> {

	let params = DilateParams {
		structuring_element: StructuringElement::from_id(args.kernel)?,
		radius: args.radius,
		object_label: args.object,
		background_label: args.background
	};

	let mrc = Mrc::read(&args.input)?;
	let mut volume = mrc.to_stack()?;

	let result = dilate(&mut volume, &params, |percent, message| {
		if !quiet {
			println!("{:3}% {}", percent, message);
		}
		true
	});
	if result != Dilation::Completed {
		bail!("Dilation did not complete");
	}

	Mrc::from_stack(volume.view())
		.save(&args.output)
		.context("Failed to save the dilated volume")?;

	Ok(())
}
