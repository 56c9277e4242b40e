//! Pantry: lifecycle manager for the embedded configuration server.
//!
//! # Usage
//!
//! ```text
//! pantry start [-H host] [-P port] [-d] [--ssl] [-l level] [--log-file FILE]
//! pantry stop  [-P port]
//! ```
//!
//! Exit codes: 0 ok, 1 generic error, 2 already running, 3 not running,
//! 4 unsupported action.

mod commands;

use std::process::ExitCode;

use clap::Parser;

use commands::server::ServerArgs;
use pantry_core::ExitOutcome;
use pantry_daemon::DaemonError;

#[derive(Parser, Debug)]
#[command(
    name = "pantry",
    version,
    about = "Run a per-port configuration server for test instances",
    long_about = None,
)]
struct Cli {
    /// `start` or `stop`.
    action: String,

    #[command(flatten)]
    server: ServerArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.server.run(&cli.action) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            let outcome = err
                .downcast_ref::<DaemonError>()
                .map(DaemonError::outcome)
                .unwrap_or(ExitOutcome::GenericError);
            ExitCode::from(outcome.code())
        }
    }
}
