
use galvanic_assert::{assert_that, matchers::*};
use ndarray::Array3;

use tilt_logger::dilate::{dilate, DilateParams, Dilation, StructuringElement};
use tilt_logger::error::TiltError;
use tilt_logger::logging;


/// a 5x5x3 volume with one object voxel in the middle
fn volume() -> Array3<u16> {
	let mut volume = Array3::zeros((5, 5, 3));
	volume[[2, 2, 1]] = 1;
	volume
}


fn params(structuring_element: StructuringElement) -> DilateParams<u16> {
	DilateParams {
		structuring_element,
		radius: 1,
		object_label: 1,
		background_label: 0
	}
}


fn count(volume: &Array3<u16>, label: u16) -> usize {
	volume.iter()
		.filter(|&&v| v == label)
		.count()
}


#[test]
fn kernel_ids() {
	let _logging = logging::init_test();

	assert_that!(&StructuringElement::from_id(0).ok(), eq(Some(StructuringElement::Box)));
	assert_that!(&StructuringElement::from_id(1).ok(), eq(Some(StructuringElement::Ball)));
	assert_that!(&StructuringElement::from_id(2).ok(), eq(Some(StructuringElement::Cross)));
	assert_that!(&matches!(StructuringElement::from_id(3), Err(TiltError::InvalidKernel(3))), eq(true));
}


#[test]
fn dilate_box() {
	let _logging = logging::init_test();

	let mut volume = volume();
	let result = dilate(&mut volume, &params(StructuringElement::Box), |_, _| true);

	assert_that!(&result, eq(Dilation::Completed));
	assert_that!(&count(&volume, 1), eq(27));
	for z in 0 ..= 2 {
		for y in 1 ..= 3 {
			for x in 1 ..= 3 {
				assert_that!(&volume[[y, x, z]], eq(1));
			}
		}
	}
	assert_that!(&volume[[0, 2, 1]], eq(0));
}


#[test]
fn dilate_cross() {
	let _logging = logging::init_test();

	let mut volume = volume();
	dilate(&mut volume, &params(StructuringElement::Cross), |_, _| true);

	assert_that!(&count(&volume, 1), eq(7));
	for (y, x, z) in [(2, 2, 1), (1, 2, 1), (3, 2, 1), (2, 1, 1), (2, 3, 1), (2, 2, 0), (2, 2, 2)] {
		assert_that!(&volume[[y, x, z]], eq(1));
	}
	assert_that!(&volume[[1, 1, 1]], eq(0));
	assert_that!(&volume[[1, 2, 0]], eq(0));
}


#[test]
fn dilate_cross_stays_on_the_axes() {
	let _logging = logging::init_test();

	let mut volume = Array3::<u16>::zeros((7, 7, 5));
	volume[[3, 3, 2]] = 1;
	let params = DilateParams {
		radius: 2,
		.. params(StructuringElement::Cross)
	};
	dilate(&mut volume, &params, |_, _| true);

	// two voxels out along each of the six directions, no diagonals
	assert_that!(&count(&volume, 1), eq(13));
	assert_that!(&volume[[1, 3, 2]], eq(1));
	assert_that!(&volume[[3, 3, 0]], eq(1));
	assert_that!(&volume[[3, 3, 4]], eq(1));
	assert_that!(&volume[[2, 2, 2]], eq(0));
	assert_that!(&volume[[2, 3, 1]], eq(0));
}


#[test]
fn dilate_ball() {
	let _logging = logging::init_test();

	let mut volume = volume();
	dilate(&mut volume, &params(StructuringElement::Ball), |_, _| true);

	// radius 1 takes in the face and edge neighbors, but not the 8 corners of the cube
	assert_that!(&count(&volume, 1), eq(19));
	for (y, x, z) in [(1, 2, 1), (2, 3, 1), (2, 2, 0), (1, 1, 1), (1, 2, 2)] {
		assert_that!(&volume[[y, x, z]], eq(1));
	}
	assert_that!(&volume[[1, 1, 0]], eq(0));
	assert_that!(&volume[[3, 3, 2]], eq(0));
}


#[test]
fn other_labels_untouched() {
	let _logging = logging::init_test();

	let mut volume = volume();
	volume[[2, 3, 0]] = 2;

	dilate(&mut volume, &params(StructuringElement::Box), |_, _| true);

	assert_that!(&volume[[2, 3, 0]], eq(2));
	assert_that!(&count(&volume, 1), eq(26));
}


#[test]
fn progress() {
	let _logging = logging::init_test();

	let mut volume = volume();
	let mut reported = Vec::new();
	dilate(&mut volume, &params(StructuringElement::Box), |percent, _| {
		reported.push(percent);
		true
	});

	// 10, 20, then one per slice, then saving and done
	assert_that!(&reported, eq(vec![10, 20, 43, 66, 90, 90, 100]));
}


#[test]
fn cancel() {
	let _logging = logging::init_test();

	let mut volume = volume();
	let result = dilate(&mut volume, &params(StructuringElement::Box), |percent, _| percent < 50);

	assert_that!(&result, eq(Dilation::Cancelled));
	assert_that!(&volume, eq(self::volume()));
}
