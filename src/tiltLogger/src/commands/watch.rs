
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use gumdrop::Options;
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::export::{export_tilt_series, Algorithm, MrcExport};
use crate::formats::Readers;
use crate::watcher::{WatchConfig, Watcher};


#[derive(Options)]
pub struct Args {

	/// TOML config file, the other options override its values
	#[options(no_short)]
	config: Option<String>,

	/// The directory to watch for new images
	#[options(no_short)]
	dir: Option<String>,

	/// The file extension of new images, eg. mrc
	#[options(no_short)]
	ext: Option<String>,

	/// The reconstruction algorithm the export is for: WBP, ART, SIRT, SART, or DFT
	#[options(no_short)]
	algorithm: Option<String>,

	/// Where to write the tilt series MRC file
	#[options(no_short)]
	output: Option<String>,

	/// Stop after this many poll cycles, or keep polling forever
	#[options(no_short)]
	cycles: Option<u32>
}


pub fn run(quiet: bool, args: Args) -> Result<()> {

	let mut config = match &args.config {
		Some(path) => Config::read(path)?,
		None => {
			let (Some(dir), Some(ext)) = (&args.dir, &args.ext)
				else { bail!("Without a config file, both --dir and --ext are required"); };
			Config::new(WatchConfig::new(dir, ext))
		}
	};

	// apply overrides
	if let Some(dir) = args.dir {
		config.watch.directory = PathBuf::from(dir);
	}
	if let Some(ext) = args.ext {
		config.watch.extension = ext;
	}
	if let Some(algorithm) = args.algorithm {
		config.export.algorithm = algorithm.parse::<Algorithm>()?;
	}
	if let Some(output) = args.output {
		config.export.output = PathBuf::from(output);
	}

	let _span = info_span!("watch", dir = %config.watch.directory.display()).entered();

	let (watcher, mut state) = Watcher::new(config.watch, Readers::builtin())
		.context("Failed to start the listener")?;

	let mut target = MrcExport::new(&config.export.output);

	let mut cycle = 0u32;
	while args.cycles.map_or(true, |cycles| cycle < cycles) {
		cycle += 1;

		let Some(report) = watcher.poll_cycle(&mut state, config.timeout_seconds)
			else { continue; };

		if !quiet {
			println!("ingested: {}, failed: {}, waiting: {}, total: {}",
				report.ingested.len(),
				report.failed.len(),
				report.skipped.len(),
				state.series().len()
			);
		}

		// an unbounded watch only ends when it's killed, so keep the export current
		if !report.ingested.is_empty() {
			export_tilt_series(state.series(), &mut target, config.export.algorithm)?;
		}
	}

	if state.series().is_empty() {
		warn!("No images were ingested, nothing to export");
	} else {
		info!("Polling finished with {} image(s) in {}", state.series().len(), target.path().to_string_lossy());
	}

	Ok(())
}
