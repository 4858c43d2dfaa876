
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;


pub struct WatchDir {
	dir: TempDir
}

impl WatchDir {

	pub fn new() -> WatchDir {
		Self {
			dir: TempDir::new()
				.expect("Failed to make temp folder")
		}
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
		self.dir.path().join(name)
	}

	pub fn print(&self) {
		let path = self.dir.path();
		println!("Watch Folder: {}", path.to_string_lossy());
		let dir = fs::read_dir(path)
			.expect(&format!("Failed to read dir: {}", path.to_string_lossy()));
		for entry in dir {
			match entry {
				Ok(entry) => println!("\t{}", entry.file_name().to_string_lossy()),
				Err(e) => println!("\tError: {}", e)
			}
		}
	}
}

impl AsRef<Path> for WatchDir {
	fn as_ref(&self) -> &Path {
		self.dir.path()
	}
}
