
use std::io;
use std::ops::Deref;

use anyhow::{Context, Result};
use display_error_chain::ErrorChainExt;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tracing::{error, warn};
use tracing::dispatcher::DefaultGuard;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tracing_subscriber::fmt::format::{Compact, Format};
use tracing_subscriber::fmt::time::OffsetTime;


pub const DEFAULT_FILTER: &str = "tilt_logger=info";
const TEST_FILTER: &str = "tilt_logger=trace";


type LogFormat = Format<Compact,OffsetTime<&'static [FormatItem<'static>]>>;


/// Logs go to stderr, stdout is left to the commands.
/// Events inside a watch or ingest span carry its fields, eg. the file being loaded.
pub fn init(log: impl AsRef<str>) -> Result<()> {

	let log_subscriber = FmtSubscriber::builder()
		.with_env_filter(log_filter(log)?)
		.event_format(log_format())
		.with_writer(io::stderr)
		.finish();

	tracing::subscriber::set_global_default(log_subscriber)
		.context("Failed to set logging subscriber")?;

	Ok(())
}


/// Logs everything from this crate to the test output, until the guard is dropped
pub fn init_test() -> DefaultGuard {

	let subscriber = FmtSubscriber::builder()
		.with_env_filter(EnvFilter::new(TEST_FILTER))
		.event_format(log_format())
		.with_test_writer()
		.finish();

	tracing::subscriber::set_default(subscriber)
}


fn log_filter(log: impl AsRef<str>) -> Result<EnvFilter> {
	let log = log.as_ref();
	EnvFilter::builder()
		.parse(log)
		.context(format!("Failed to parse log filter: {}", log))
}


fn log_format() -> LogFormat {

	let time_format = format_description!(
		version = 2,
		"[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
	);

	let time_offset = UtcOffset::current_local_offset()
		.unwrap_or(UtcOffset::UTC);

	Format::default()
		.compact()
		.with_timer(OffsetTime::new(time_offset, time_format))
		.with_target(false)
}


/// Logs the whole error chain and drops the error.
/// `log_err` is for failures that end the program, `warn_err` for ones the watcher lives through.
pub trait ResultExt<T> {
	fn log_err(self) -> Result<T,()>;
	fn warn_err(self) -> Result<T,()>;
}

impl<T,E> ResultExt<T> for Result<T,E>
	where
		E: Into<anyhow::Error>
{

	fn log_err(self) -> Result<T,()> {
		self.map_err(|e| {
			let e: anyhow::Error = e.into();
			error!("{}", e.deref().chain());
		})
	}

	fn warn_err(self) -> Result<T,()> {
		self.map_err(|e| {
			let e: anyhow::Error = e.into();
			warn!("{}", e.deref().chain());
		})
	}
}
