#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Privileged helper entrypoint: verifies its caller, elevates, and runs one operation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::Parser;
use fsgate_config::HelperConfig;
use fsgate_helper::{
    CallerVerifier, Executor, HelperOutcome, NixIdentityControl, PrivilegeAcquirer,
    TransportFile, run_authorized,
};
use fsgate_telemetry::init_logging;

/// Command line accepted from the trusted front end.
#[derive(Debug, Parser)]
#[command(name = "fsgate-helper", version, about = "Run one privileged fsgate operation")]
struct Cli {
    /// Transport file holding the encoded operation descriptor.
    #[arg(long, value_name = "PATH")]
    transport: PathBuf,
}

fn main() -> ExitCode {
    let caller = match CallerVerifier::system().verify() {
        Ok(caller) => caller,
        Err(err) => return finish(&HelperOutcome::aborted(&err)),
    };

    if let Err(err) = start_logging() {
        return finish(&HelperOutcome::invalid_invocation(format!("{err:#}")));
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let message = format!(
                "invalid invocation: {}",
                err.kind().as_str().unwrap_or("unusable arguments")
            );
            let _ = err.print();
            return finish(&HelperOutcome::invalid_invocation(message));
        }
    };

    let outcome = run_authorized(
        &caller,
        PrivilegeAcquirer::new(NixIdentityControl),
        &TransportFile::new(cli.transport),
        &Executor::standard(),
    );
    finish(&outcome)
}

fn start_logging() -> anyhow::Result<()> {
    let config = HelperConfig::from_env()
        .map_err(|err| anyhow!(err.describe()))
        .context("invalid helper configuration")?;
    if let Err(err) = init_logging(&config.logging()) {
        eprintln!("warning: logging unavailable: {err}");
    }
    Ok(())
}

fn finish(outcome: &HelperOutcome) -> ExitCode {
    for line in outcome.diagnostics() {
        eprintln!("{line}");
    }
    ExitCode::from(outcome.exit.code())
}
