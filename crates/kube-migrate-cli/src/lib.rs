mod error;
pub mod logging;

use std::path::{Path, PathBuf};

use clap::{Args, Parser};
use kube_migrate::upgrade_manifest;

pub use error::{CliError, CliResult};
pub use logging::LogFormat;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kube-migrate",
    version,
    about = "Upgrade extensions/v1beta1 Deployments to apps/v1 in place"
)]
pub struct Cli {
    /// Manifests to upgrade; each is rewritten only if it changes
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Default log level, overridden by RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<tracing::Level>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Upgraded { documents: usize },
    Unchanged,
}

/// Upgrade one manifest file in place.
///
/// The file is only reopened for writing when at least one document changed.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, serialized or written.
pub fn upgrade_file(path: &Path) -> CliResult<FileOutcome> {
    let source = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let source = String::from_utf8(source).map_err(|err| CliError::Read {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    })?;

    let upgraded = upgrade_manifest(&source).map_err(|err| match err {
        kube_migrate::Error::Load(source) => CliError::Parse {
            path: path.to_path_buf(),
            source,
        },
        kube_migrate::Error::Emit(source) => CliError::Emit {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let Some(upgraded) = upgraded else {
        tracing::debug!(path = %path.display(), "nothing to upgrade");
        return Ok(FileOutcome::Unchanged);
    };

    std::fs::write(path, upgraded.text).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        documents = upgraded.documents,
        "rewrote manifest"
    );
    Ok(FileOutcome::Upgraded {
        documents: upgraded.documents,
    })
}

/// Run the CLI.
///
/// Files are handled one after another and the first failure aborts the run.
/// Files rewritten before the failure stay rewritten.
///
/// # Errors
///
/// Returns the first error hit by [`upgrade_file`].
pub fn run(cli: &Cli) -> CliResult<Vec<FileOutcome>> {
    let outcomes = cli
        .files
        .iter()
        .map(|path| upgrade_file(path))
        .collect::<CliResult<Vec<_>>>()?;
    let upgraded = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, FileOutcome::Upgraded { .. }))
        .count();
    tracing::debug!(files = outcomes.len(), upgraded, "done");
    Ok(outcomes)
}
