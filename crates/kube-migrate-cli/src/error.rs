use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: kube_migrate::LoadError,
    },

    #[error("failed to serialize {path}")]
    Emit {
        path: PathBuf,
        #[source]
        source: kube_migrate::EmitError,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            CliError::Read { path, .. }
            | CliError::Parse { path, .. }
            | CliError::Emit { path, .. }
            | CliError::Write { path, .. } => path,
        }
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;
