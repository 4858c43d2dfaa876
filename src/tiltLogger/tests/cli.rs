
mod util;


use std::fs;
use std::time::Duration;

use galvanic_assert::{assert_that, matchers::*};
use indoc::formatdoc;
use ndarray::Array3;

use tilt_logger::mrc::Mrc;

use crate::util::cmd::{cmd, run_for, watch_cmd, AssertExt};
use crate::util::watch_dir::WatchDir;


fn write_projection(dir: &WatchDir, name: &str, angle: f64, point: (usize, usize)) {
	let mut stack = Array3::<f32>::zeros((32, 32, 1));
	stack[[point.0, point.1, 0]] = 100.0;
	let mut mrc = Mrc::from_stack(stack.view());
	mrc.set_tilt_angles(vec![angle])
		.expect("Failed to set angle");
	mrc.save(dir.file(name))
		.expect("Failed to save projection");
}


#[test]
fn no_command() {
	cmd()
		.assert()
		.print_output()
		.failure();
}


#[test]
fn watch() {

	let dir = WatchDir::new();
	let out = WatchDir::new();
	write_projection(&dir, "tilt_01.mrc", -30.0, (3, 4));
	write_projection(&dir, "tilt_02.mrc", 0.0, (20, 25));
	write_projection(&dir, "tilt_03.mrc", 30.0, (16, 16));
	dir.print();

	let output = out.file("series.mrc");
	let assert = watch_cmd(dir.path(), "mrc")
		.arg("--output").arg(&output)
		.arg("--cycles").arg("1")
		.assert()
		.print_output()
		.success();
	out.print();

	// logs go to stderr, the summary is all there is on stdout
	assert_that!(&assert.stdout_lines(), eq(vec!["ingested: 3, failed: 0, waiting: 0, total: 3".to_string()]));

	let series = Mrc::read(&output)
		.expect("Failed to read tilt series");
	assert_that!(&(series.nx(), series.ny(), series.nz()), eq((32, 32, 3)));
	assert_that!(&series.tilt_angles().map(|a| a.to_vec()), eq(Some(vec![-30.0, 0.0, 30.0])));

	// every projection is centered
	for z in 0 .. 3 {
		assert_that!(&series.get(16, 16, z), eq(100.0));
	}

	assert_that!(&out.file("series.rawtlt").exists(), eq(true));
}


#[test]
fn watch_without_end() {

	let dir = WatchDir::new();
	let out = WatchDir::new();
	write_projection(&dir, "tilt_01.mrc", -30.0, (3, 4));
	write_projection(&dir, "tilt_02.mrc", 30.0, (20, 25));

	// no cycle limit: the export has to be on disk before the process gets killed
	let output = out.file("series.mrc");
	let mut watch = watch_cmd(dir.path(), "mrc");
	watch.arg("--output").arg(&output);
	run_for(watch, Duration::from_secs(5));
	out.print();

	let series = Mrc::read(&output)
		.expect("Failed to read tilt series");
	assert_that!(&series.nz(), eq(2));
	assert_that!(&series.tilt_angles().map(|a| a.to_vec()), eq(Some(vec![-30.0, 30.0])));
}


#[test]
fn watch_config() {

	let dir = WatchDir::new();
	let out = WatchDir::new();
	write_projection(&dir, "tilt_01.mrc", -30.0, (3, 4));
	write_projection(&dir, "tilt_02.mrc", 30.0, (20, 25));

	let config_path = out.file("config.toml");
	fs::write(&config_path, formatdoc! { r#"
		[watch]
		directory = "{dir}"
		extension = "mrc"
		timeout_seconds = 1

		[export]
		algorithm = "SIRT"
		output = "{output}"
	"#,
		dir = dir.path().to_string_lossy(),
		output = out.file("matrix.mrc").to_string_lossy()
	}).expect("Failed to write config");

	cmd()
		.arg("--quiet")
		.arg("watch")
		.arg("--config").arg(&config_path)
		.arg("--cycles").arg("2")
		.assert()
		.print_output()
		.success();

	// 32 slices of 32 rays in 2 projections
	let matrix = Mrc::read(out.file("matrix.mrc"))
		.expect("Failed to read matrix");
	assert_that!(&(matrix.nx(), matrix.ny(), matrix.nz()), eq((64, 32, 1)));
}


#[test]
fn watch_needs_a_dir() {
	cmd()
		.arg("watch")
		.arg("--ext").arg("mrc")
		.arg("--cycles").arg("1")
		.assert()
		.print_output()
		.failure();
}


#[test]
fn watch_bad_algorithm() {
	let dir = WatchDir::new();
	watch_cmd(dir.path(), "mrc")
		.arg("--algorithm").arg("FBP")
		.arg("--cycles").arg("1")
		.assert()
		.print_output()
		.failure();
}


#[test]
fn dilate() {

	let dir = WatchDir::new();
	let input = dir.file("labels.mrc");
	let output = dir.file("dilated.mrc");

	let mut volume = Array3::<f32>::zeros((5, 5, 1));
	volume[[2, 2, 0]] = 1.0;
	Mrc::from_stack(volume.view())
		.save(&input)
		.expect("Failed to save volume");

	cmd()
		.arg("dilate")
		.arg("--kernel").arg("2")
		.arg(&input)
		.arg(&output)
		.assert()
		.print_output()
		.success();

	let dilated = Mrc::read(&output)
		.expect("Failed to read dilated volume")
		.to_stack()
		.expect("Failed to shape volume");
	let num_object = dilated.iter()
		.filter(|&&v| v == 1.0)
		.count();
	assert_that!(&num_object, eq(5));
	assert_that!(&dilated[[1, 2, 0]], eq(1.0));
	assert_that!(&dilated[[1, 1, 0]], eq(0.0));
}


#[test]
fn dilate_bad_kernel() {

	let dir = WatchDir::new();
	let input = dir.file("labels.mrc");
	Mrc::from_stack(Array3::<f32>::zeros((5, 5, 1)).view())
		.save(&input)
		.expect("Failed to save volume");

	cmd()
		.arg("dilate")
		.arg("--kernel").arg("7")
		.arg(&input)
		.arg(dir.file("out.mrc"))
		.assert()
		.print_output()
		.failure();
}
