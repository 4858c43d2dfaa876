
use std::path::Path;
use std::process::Output;
use std::time::Duration;

use assert_cmd::assert::Assert;
use assert_cmd::Command;


const BIN_NAME: &'static str = "tilt-logger";


pub fn cmd() -> Command {
	Command::cargo_bin(BIN_NAME)
		.unwrap()
}


/// `tilt-logger watch` on a directory, before any other options
pub fn watch_cmd(dir: impl AsRef<Path>, ext: &str) -> Command {
	let mut cmd = cmd();
	cmd.arg("watch")
		.arg("--dir").arg(dir.as_ref())
		.arg("--ext").arg(ext);
	cmd
}


/// Runs a command that never exits on its own, and kills it after a while
pub fn run_for(mut cmd: Command, duration: Duration) -> Output {
	let output = cmd.timeout(duration)
		.output()
		.expect("Failed to run command");
	println!("STDOUT:\n{}", String::from_utf8_lossy(&output.stdout));
	println!("STDERR:\n{}", String::from_utf8_lossy(&output.stderr));
	output
}


pub trait AssertExt {
	fn print_output(self) -> Self;
	fn stdout_lines(&self) -> Vec<String>;
}

impl AssertExt for Assert {

	fn print_output(self) -> Self {
		let output = self.get_output();
		println!("STDOUT:\n{}", String::from_utf8_lossy(&output.stdout));
		println!("STDERR:\n{}", String::from_utf8_lossy(&output.stderr));
		self
	}

	fn stdout_lines(&self) -> Vec<String> {
		String::from_utf8_lossy(&self.get_output().stdout)
			.lines()
			.map(|line| line.to_string())
			.collect()
	}
}
