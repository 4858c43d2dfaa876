
//! Watches a directory for newly arrived projection images and assembles them into a tilt series.
//!
//! The watcher is either idle (no new files this cycle) or ingesting a batch of new files.
//! All of the mutable state lives in [`WatchState`], which the caller owns
//! and hands to each [`Watcher`] operation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use display_error_chain::ErrorChainExt;
use ndarray::{Array2, Array3, Axis};
use tracing::{debug, info, info_span, warn};

use crate::corrections::{background_subtract, center_of_mass_align};
use crate::error::TiltError;
use crate::formats::{ProjectionImage, ProjectionReader, Readers};
use crate::logging::ResultExt;


/// What to do with the rest of a batch when one file fails to ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
	/// stop at the first failure, the remaining files wait for the next poll
	#[default]
	AbandonBatch,
	/// keep going with the next file
	SkipFailed
}

impl FromStr for BatchPolicy {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self,Self::Err> {
		match s {
			"abandon" => Ok(Self::AbandonBatch),
			"skip" => Ok(Self::SkipFailed),
			_ => anyhow::bail!("Unknown batch policy: {}, try one of: abandon, skip", s)
		}
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
	pub directory: PathBuf,
	pub extension: String,
	pub poll_interval: Duration,
	pub batch_policy: BatchPolicy,
	/// after this many failed attempts, a file is quarantined and never read again.
	/// None retries forever
	pub max_attempts: Option<u32>
}

impl WatchConfig {

	pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
		Self {
			directory: directory.into(),
			extension: extension.into(),
			poll_interval: Duration::from_secs(1),
			batch_policy: BatchPolicy::default(),
			max_attempts: None
		}
	}
}


/// The projections ingested so far, in ingestion order.
/// The files, angles, and stack frames always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct TiltSeries {
	files: Vec<String>,
	angles: Vec<f64>,
	/// shaped [rows, cols, frames]
	stack: Array3<f32>
}

impl TiltSeries {

	pub fn new() -> Self {
		Self {
			files: Vec::new(),
			angles: Vec::new(),
			stack: Array3::zeros((0, 0, 0))
		}
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	pub fn files(&self) -> &[String] {
		&self.files
	}

	pub fn angles(&self) -> &[f64] {
		&self.angles
	}

	pub fn stack(&self) -> &Array3<f32> {
		&self.stack
	}

	/// The [rows, cols] of every frame, once the first one is in
	pub fn frame_shape(&self) -> Option<(usize, usize)> {
		if self.is_empty() {
			None
		} else {
			let (rows, cols, _) = self.stack.dim();
			Some((rows, cols))
		}
	}

	/// Appends all three parts of a projection, or nothing at all
	pub fn push(&mut self, file: impl Into<String>, angle: f64, image: Array2<f32>) -> Result<(),TiltError> {

		match self.frame_shape() {

			// the first image decides the shape of the stack
			None => self.stack = image.insert_axis(Axis(2)),

			Some(shape) => {
				if image.dim() != shape {
					return Err(TiltError::ShapeMismatch {
						expected: shape,
						found: image.dim()
					});
				}
				self.stack.push(Axis(2), image.view())
					.map_err(|_| TiltError::ShapeMismatch {
						expected: shape,
						found: image.dim()
					})?;
			}
		}

		self.angles.push(angle);
		self.files.push(file.into());

		Ok(())
	}
}

impl Default for TiltSeries {
	fn default() -> Self {
		Self::new()
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct WatchState {
	listen_directory: PathBuf,
	file_extension: String,
	/// the candidate files from the latest directory listing
	known_files: BTreeSet<String>,
	series: TiltSeries,
	/// failed ingestion attempts, per file
	attempts: BTreeMap<String,u32>,
	/// files that failed too many times, they're never retried
	quarantined: BTreeSet<String>
}

impl WatchState {

	/// Creates the listen directory if needed, and takes the first listing.
	/// Files already in the directory count as new: the first poll ingests them.
	pub fn new(listen_directory: impl Into<PathBuf>, file_extension: impl Into<String>) -> Result<Self,TiltError> {

		let listen_directory = listen_directory.into();
		let file_extension = file_extension.into();

		fs::create_dir_all(&listen_directory)
			.map_err(|source| TiltError::DirectoryAccess {
				path: listen_directory.clone(),
				source
			})?;

		let known_files = list_candidate_files(&listen_directory, &file_extension)?;

		Ok(Self {
			listen_directory,
			file_extension,
			known_files,
			series: TiltSeries::new(),
			attempts: BTreeMap::new(),
			quarantined: BTreeSet::new()
		})
	}

	pub fn listen_directory(&self) -> &Path {
		&self.listen_directory
	}

	pub fn file_extension(&self) -> &str {
		&self.file_extension
	}

	pub fn known_files(&self) -> &BTreeSet<String> {
		&self.known_files
	}

	pub fn series(&self) -> &TiltSeries {
		&self.series
	}

	pub fn into_series(self) -> TiltSeries {
		self.series
	}

	pub fn seen_files(&self) -> &[String] {
		self.series.files()
	}

	pub fn tilt_angles(&self) -> &[f64] {
		self.series.angles()
	}

	pub fn tilt_stack(&self) -> &Array3<f32> {
		self.series.stack()
	}

	pub fn attempts(&self, file: &str) -> u32 {
		self.attempts.get(file)
			.copied()
			.unwrap_or(0)
	}

	pub fn quarantined(&self) -> &BTreeSet<String> {
		&self.quarantined
	}

	/// Known files that are neither ingested nor quarantined, sorted by filename
	pub fn pending(&self) -> Vec<String> {
		let seen = self.series.files()
			.iter()
			.collect::<BTreeSet<_>>();
		self.known_files.iter()
			.filter(|file| !seen.contains(file) && !self.quarantined.contains(*file))
			.cloned()
			.collect()
	}
}


/// All the regular files directly in the directory whose names end with the extension
pub fn list_candidate_files(directory: &Path, extension: &str) -> Result<BTreeSet<String>,TiltError> {

	let access_err = |source: io::Error| TiltError::DirectoryAccess {
		path: directory.to_path_buf(),
		source
	};

	let mut files = BTreeSet::new();
	for entry in fs::read_dir(directory).map_err(access_err)? {
		let entry = entry.map_err(access_err)?;
		let is_file = entry.file_type()
			.map_err(access_err)?
			.is_file();
		if !is_file {
			continue;
		}
		let name = entry.file_name()
			.to_string_lossy()
			.to_string();
		if name.ends_with(extension) {
			files.insert(name);
		}
	}

	Ok(files)
}


#[derive(Debug)]
pub struct FileFailure {
	pub file: String,
	/// counting this one
	pub attempts: u32,
	pub error: TiltError
}


/// What happened to each new file during one ingestion cycle
#[derive(Debug, Default)]
pub struct IngestReport {
	pub ingested: Vec<String>,
	pub failed: Vec<FileFailure>,
	/// never attempted, because an earlier failure abandoned the batch
	pub skipped: Vec<String>,
	/// failed files that ran out of attempts this cycle
	pub quarantined: Vec<String>
}

impl IngestReport {

	pub fn is_complete(&self) -> bool {
		self.failed.is_empty() && self.skipped.is_empty()
	}
}


pub struct Watcher {
	config: WatchConfig,
	reader: Box<dyn ProjectionReader>
}

impl Watcher {

	/// Picks the reader for the configured extension and prepares the listen directory.
	/// Either failing is fatal.
	pub fn new(config: WatchConfig, readers: Readers) -> Result<(Self, WatchState),TiltError> {

		let reader = readers.select(&config.extension)?;
		let state = WatchState::new(&config.directory, &config.extension)?;

		info!("Listener on {} created, watching for *{} files", config.directory.to_string_lossy(), config.extension);

		Ok((Self { config, reader }, state))
	}

	pub fn config(&self) -> &WatchConfig {
		&self.config
	}

	/// Re-lists the listen directory, returns the number of files waiting to be ingested
	pub fn refresh(&self, state: &mut WatchState) -> Result<usize,TiltError> {
		state.known_files = list_candidate_files(&state.listen_directory, &state.file_extension)?;
		Ok(state.pending().len())
	}

	/// Returns true if new files showed up within `timeout_seconds` checks, after ingesting them
	pub fn poll(&self, state: &mut WatchState, timeout_seconds: u32) -> Result<bool,TiltError> {
		Ok(self.poll_report(state, timeout_seconds)?.is_some())
	}

	/// Checks the directory once per poll interval, up to `timeout_seconds` times.
	/// As soon as there are new files, ingests them and returns what happened.
	pub fn poll_report(&self, state: &mut WatchState, timeout_seconds: u32) -> Result<Option<IngestReport>,TiltError> {

		for i in 0 .. timeout_seconds {
			let num_pending = self.refresh(state)?;
			if num_pending > 0 {
				return Ok(Some(self.append_new_files(state)));
			}
			debug!("No new files on check {} of {}", i + 1, timeout_seconds);
			thread::sleep(self.config.poll_interval);
		}

		Ok(None)
	}

	/// One cycle of a long-running watch. A failed directory listing is logged,
	/// and the next cycle tries again after one poll interval.
	pub fn poll_cycle(&self, state: &mut WatchState, timeout_seconds: u32) -> Option<IngestReport> {
		let result = self.poll_report(state, timeout_seconds)
			.warn_err();
		if result.is_err() {
			thread::sleep(self.config.poll_interval);
		}
		result.ok()
			.flatten()
	}

	/// Ingests the pending files of the latest listing, in filename order
	pub fn append_new_files(&self, state: &mut WatchState) -> IngestReport {

		let mut report = IngestReport::default();

		let mut pending = state.pending().into_iter();
		while let Some(file) = pending.next() {

			let _span = info_span!("ingest", file = %file).entered();
			info!("Loading {}", file);
			let path = state.listen_directory.join(&file);

			let result = self.ingest(&path)
				.and_then(|projection| state.series.push(&file, projection.tilt_angle, projection.image));

			match result {

				Ok(()) => {
					state.attempts.remove(&file);
					report.ingested.push(file);
				}

				Err(error) => {

					let attempts = state.attempts.entry(file.clone())
						.or_insert(0);
					*attempts += 1;
					let attempts = *attempts;

					warn!("Could not ingest {} (attempt {}): {}", file, attempts, error.chain());

					if self.config.max_attempts.is_some_and(|max| attempts >= max) {
						warn!("Quarantined {} after {} failed attempts", file, attempts);
						state.attempts.remove(&file);
						state.quarantined.insert(file.clone());
						report.quarantined.push(file.clone());
					}

					report.failed.push(FileFailure {
						file,
						attempts,
						error
					});

					if self.config.batch_policy == BatchPolicy::AbandonBatch {
						report.skipped.extend(pending.by_ref());
						if !report.skipped.is_empty() {
							warn!("Abandoned the batch, {} file(s) will be retried on the next poll", report.skipped.len());
						}
						break;
					}
				}
			}
		}

		info!("Tilt series has {} image(s)", state.series.len());

		report
	}

	/// read, then correct
	fn ingest(&self, path: &Path) -> Result<ProjectionImage,TiltError> {

		let mut projection = self.reader.read(path)
			.map_err(|source| TiltError::ImageRead {
				path: path.to_path_buf(),
				source
			})?;

		background_subtract(&mut projection.image)?;
		projection.image = center_of_mass_align(&projection.image)?;

		Ok(projection)
	}
}
