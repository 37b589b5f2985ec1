use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use repcrec_cli::config::Config;
use repcrec_cli::driver::{run, RunOutcome};
use repcrec_cli::sink::TerminalSink;

/// A simulator of a replicated, distributed transactional key-value store.
/// Feeds a scripted trace of transaction/site commands through the RepCReC
/// coordinator and prints the resulting commit/abort/read/dump log.
#[derive(Debug, Parser)]
#[command(version, author)]
struct Args {
    /// Trace file to replay. Omit to read from standard input.
    trace: Option<PathBuf>,

    /// Verbosity of internal diagnostic logging (trace|debug|info|warn|error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Directory for the diagnostic log file.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable ANSI highlighting of deadlock/abort lines.
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = Config::default();
    config.log_level = args.log_level;
    if let Some(dir) = args.log_dir {
        config.log_dir = dir;
    }
    config.color = !args.no_color && io::stdout().is_terminal();

    if let Err(e) = repcrec_cli::logging::init(&config.log_dir, &config.log_level) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let mut sink = TerminalSink::new(config.color);

    let outcome = match args.trace {
        Some(path) => match File::open(&path) {
            Ok(file) => run(BufReader::new(file), &mut sink),
            Err(e) => {
                eprintln!("error: cannot open trace file {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => run(io::stdin().lock(), &mut sink),
    };

    match outcome {
        RunOutcome::Finished => ExitCode::SUCCESS,
        RunOutcome::ParseFailed(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
        RunOutcome::CoordinatorFailed(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
