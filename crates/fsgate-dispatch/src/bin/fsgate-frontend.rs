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

//! Command-line front end: one subcommand per operation kind, each run through the
//! privileged helper.

use std::path::{self, Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fsgate_config::DispatchConfig;
use fsgate_dispatch::Dispatcher;
use fsgate_ops::{ArchiveFormat, ExecutionResult, HelperExit};
use fsgate_telemetry::init_logging;
use tokio::io::AsyncReadExt;

/// Exit status when the helper could not be reached at all.
const EXIT_UNREACHABLE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(result) => report(&result),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_UNREACHABLE)
        }
    }
}

#[derive(Parser)]
#[command(
    name = "fsgate-frontend",
    version,
    about = "Run privileged file operations through the fsgate helper"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove files or directory trees.
    Delete {
        /// Paths to remove.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Move items into a directory.
    Move(TransferArgs),
    /// Copy items into a directory.
    Copy(TransferArgs),
    /// Symlink items into a directory.
    Link(TransferArgs),
    /// Move one item to an exact new path.
    Rename {
        /// Item to rename.
        source: PathBuf,
        /// New path.
        destination: PathBuf,
    },
    /// Create directories and empty files.
    Create {
        /// Directory to create, with intermediates.
        #[arg(long = "dir")]
        directories: Vec<PathBuf>,
        /// File to create when absent.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Change owner and/or group.
    Chown {
        /// Target path.
        path: PathBuf,
        /// User name or uid.
        #[arg(long, required_unless_present = "group")]
        owner: Option<String>,
        /// Group name or gid.
        #[arg(long)]
        group: Option<String>,
    },
    /// Change permission bits.
    Chmod {
        /// Octal mode, e.g. 0644.
        #[arg(value_parser = parse_mode)]
        mode: u32,
        /// Target path.
        path: PathBuf,
    },
    /// Replace a file with text.
    WriteText {
        /// Target file.
        path: PathBuf,
        /// Replacement text.
        text: String,
    },
    /// Replace a file with the bytes read from standard input.
    WriteBytes {
        /// Target file.
        path: PathBuf,
    },
    /// Build an archive.
    Compress {
        /// Archive format.
        #[arg(long, value_enum)]
        format: FormatArg,
        /// Archive to produce.
        destination: PathBuf,
        /// Items to include.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Expand an archive.
    Decompress {
        /// Archive to expand.
        archive: PathBuf,
        /// Output directory.
        destination: PathBuf,
        /// Archive format; detected from the file name when omitted.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Write every rendition of an asset catalog into a directory.
    ExtractCatalog {
        /// Catalog file.
        catalog: PathBuf,
        /// Output directory.
        destination: PathBuf,
    },
    /// List a directory.
    Ls {
        /// Directory to list.
        path: PathBuf,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Destination directory.
    #[arg(long, short = 't')]
    destination: PathBuf,
    /// Items to transfer.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Zip,
    Tar,
    TarGz,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Zip => Self::Zip,
            FormatArg::Tar => Self::Tar,
            FormatArg::TarGz => Self::TarGz,
        }
    }
}

async fn run(cli: Cli) -> Result<ExecutionResult> {
    let config = DispatchConfig::from_env()
        .map_err(|err| anyhow!(err.describe()))
        .context("invalid front-end configuration")?;
    if let Err(err) = init_logging(&config.logging()) {
        eprintln!("warning: logging unavailable: {err}");
    }
    let dispatcher = Dispatcher::from_config(&config);

    let dispatched = match cli.command {
        Command::Delete { paths } => dispatcher.delete(absolute_all(&paths)?).await,
        Command::Move(args) => {
            dispatcher
                .move_items(absolute_all(&args.paths)?, absolute(&args.destination)?)
                .await
        }
        Command::Copy(args) => {
            dispatcher
                .copy_items(absolute_all(&args.paths)?, absolute(&args.destination)?)
                .await
        }
        Command::Link(args) => {
            dispatcher
                .link_items(absolute_all(&args.paths)?, absolute(&args.destination)?)
                .await
        }
        Command::Rename {
            source,
            destination,
        } => {
            dispatcher
                .rename(absolute(&source)?, absolute(&destination)?)
                .await
        }
        Command::Create { directories, files } => {
            dispatcher
                .create_paths(absolute_all(&directories)?, absolute_all(&files)?)
                .await
        }
        Command::Chown { path, owner, group } => {
            dispatcher.set_owner_group(absolute(&path)?, owner, group).await
        }
        Command::Chmod { mode, path } => dispatcher.set_permissions(absolute(&path)?, mode).await,
        Command::WriteText { path, text } => dispatcher.write_text(absolute(&path)?, text).await,
        Command::WriteBytes { path } => {
            let mut data = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut data)
                .await
                .context("failed to read standard input")?;
            dispatcher.write_bytes(absolute(&path)?, data).await
        }
        Command::Compress {
            format,
            destination,
            paths,
        } => {
            dispatcher
                .compress(absolute_all(&paths)?, absolute(&destination)?, format.into())
                .await
        }
        Command::Decompress {
            archive,
            destination,
            format,
        } => {
            dispatcher
                .decompress(absolute(&archive)?, absolute(&destination)?, format.map(Into::into))
                .await
        }
        Command::ExtractCatalog {
            catalog,
            destination,
        } => {
            dispatcher
                .extract_catalog(absolute(&catalog)?, absolute(&destination)?)
                .await
        }
        Command::Ls { path } => dispatcher.list_directory(absolute(&path)?).await,
    };
    dispatched.map_err(|err| anyhow!(err.describe()))
}

fn report(result: &ExecutionResult) -> ExitCode {
    if let Some(entries) = result.entries() {
        for entry in entries {
            println!("{}", entry.display());
        }
    }
    if let Some(summary) = result.summary() {
        for line in summary.lines() {
            eprintln!("error: {line}");
        }
    }
    ExitCode::from(HelperExit::for_result(result).code())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path::absolute(path).with_context(|| format!("cannot resolve {}", path.display()))
}

fn absolute_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|path| absolute(path)).collect()
}

fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("`{value}` is not an octal mode between 0 and 7777"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn modes_parse_as_octal() {
        assert_eq!(parse_mode("0644"), Ok(0o644));
        assert_eq!(parse_mode("0o4755"), Ok(0o4755));
        assert!(parse_mode("0899").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn chown_requires_owner_or_group() {
        assert!(Cli::try_parse_from(["fsgate-frontend", "chown", "/tmp/a"]).is_err());
        assert!(
            Cli::try_parse_from(["fsgate-frontend", "chown", "/tmp/a", "--group", "staff"])
                .is_ok()
        );
    }

    #[test]
    fn relative_arguments_become_absolute() -> Result<()> {
        let resolved = absolute_all(&[PathBuf::from("notes.txt"), PathBuf::from("/etc/hosts")])?;
        assert!(resolved.iter().all(|path| path.is_absolute()));
        assert_eq!(resolved[1], PathBuf::from("/etc/hosts"));
        Ok(())
    }
}
