
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use toml::Table;

use crate::export::Algorithm;
use crate::watcher::{BatchPolicy, WatchConfig};


pub const DEFAULT_TIMEOUT_SECONDS: u32 = 60;
pub const DEFAULT_OUTPUT: &str = "tilt_series.mrc";


/// Config is the contents of a config TOML file, eg:
/// ```toml
/// [watch]
/// directory = "/data/incoming"
/// extension = "mrc"
///
/// [export]
/// algorithm = "WBP"
/// ```
pub struct Config {
	pub watch: WatchConfig,
	/// number of directory checks per poll
	pub timeout_seconds: u32,
	pub export: ConfigExport
}

pub struct ConfigExport {
	pub algorithm: Algorithm,
	pub output: PathBuf
}

impl Default for ConfigExport {
	fn default() -> Self {
		Self {
			algorithm: Algorithm::Wbp,
			output: PathBuf::from(DEFAULT_OUTPUT)
		}
	}
}

impl Config {

	pub fn new(watch: WatchConfig) -> Self {
		Self {
			watch,
			timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
			export: ConfigExport::default()
		}
	}

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let toml = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file at: {}", path.to_string_lossy()))?;
		Self::parse(&toml)
			.with_context(|| format!("Failed to parse config file at: {}", path.to_string_lossy()))
	}

	pub fn parse(toml: &str) -> Result<Self> {

		let toml = toml.parse::<Table>()
			.context("Config file is not valid TOML")?;

		// read the watch section
		let toml_watch = toml.get("watch")
			.context("Missing [watch] section from config file")?
			.as_table()
			.context("watch key is not a table")?;

		let directory = get_str(toml_watch, "watch", "directory")?
			.context("Missing watch.directory")?;
		let extension = get_str(toml_watch, "watch", "extension")?
			.context("Missing watch.extension")?;

		let mut watch = WatchConfig::new(directory, extension);
		if let Some(ms) = get_u32(toml_watch, "watch", "poll_interval_ms")? {
			watch.poll_interval = Duration::from_millis(ms as u64);
		}
		if let Some(policy) = get_str(toml_watch, "watch", "batch_policy")? {
			watch.batch_policy = policy.parse::<BatchPolicy>()?;
		}
		watch.max_attempts = get_u32(toml_watch, "watch", "max_attempts")?;

		let mut config = Config::new(watch);
		if let Some(timeout_seconds) = get_u32(toml_watch, "watch", "timeout_seconds")? {
			config.timeout_seconds = timeout_seconds;
		}

		// read the optional export section
		if let Some(toml_export) = toml.get("export") {

			let toml_export = toml_export.as_table()
				.context("export key is not a table")?;

			if let Some(algorithm) = get_str(toml_export, "export", "algorithm")? {
				config.export.algorithm = algorithm.parse::<Algorithm>()?;
			}
			if let Some(output) = get_str(toml_export, "export", "output")? {
				config.export.output = PathBuf::from(output);
			}
		}

		Ok(config)
	}
}


fn get_str<'a>(table: &'a Table, section: &str, key: &str) -> Result<Option<&'a str>> {
	table.get(key)
		.map(|value| value.as_str()
			.with_context(|| format!("{}.{} was not a string", section, key)))
		.transpose()
}


fn get_u32(table: &Table, section: &str, key: &str) -> Result<Option<u32>> {
	table.get(key)
		.map(|value| {
			let i = value.as_integer()
				.with_context(|| format!("{}.{} was not an integer", section, key))?;
			u32::try_from(i)
				.with_context(|| format!("{}.{} is out of range: {}", section, key, i))
		})
		.transpose()
}

