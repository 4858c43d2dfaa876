
use std::process::ExitCode;

use anyhow::{bail, Result};
use gumdrop::{Options, ParsingStyle};

use tilt_logger::commands;
use tilt_logger::logging::{self, ResultExt};


#[derive(Options)]
struct Args {

	#[options(help_flag)]
	help: bool,

	/// settings for log output
	#[options(default = "tilt_logger=info")]
	log: String,

	/// Omits unnecessary stdout messages
	quiet: bool,

	#[options(command)]
	cmd: Option<Command>
}

#[derive(Options)]
enum Command {

	/// Watch a directory for new projection images and assemble a tilt series
	Watch(commands::watch::Args),

	/// Dilate labeled objects in a segmented MRC volume
	Dilate(commands::dilate::Args)
}


fn main() -> ExitCode {

	// parse arguments
	let args = Args::parse_args_or_exit(ParsingStyle::AllOptions);

	// init logging
	let Ok(_) = logging::init(&args.log)
		.log_err()
		else { return ExitCode::FAILURE; };

	let Ok(_) = run(args)
		.log_err()
		else { return ExitCode::FAILURE; };

	// we finished! =)
	ExitCode::SUCCESS
}


#[tracing::instrument(skip_all, level = 5, name = "TiltLogger")]
fn run(args: Args) -> Result<()> {

	match args.cmd {
		Some(Command::Watch(cmd_args)) => commands::watch::run(args.quiet, cmd_args),
		Some(Command::Dilate(cmd_args)) => commands::dilate::run(args.quiet, cmd_args),
		None => bail!("No command, try one of:\n{}", Args::command_list().unwrap_or_default())
	}
}
