use std::path::{Path, PathBuf};
use std::sync::Once;

use color_eyre::eyre;

/// Returns the workspace root directory via the `CARGO_WORKSPACE_DIR` env var
/// set in `.cargo/config.toml`.
///
/// # Panics
///
/// Panics if `CARGO_WORKSPACE_DIR` is not set.
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(
        std::env::var("CARGO_WORKSPACE_DIR")
            .expect("CARGO_WORKSPACE_DIR must be set in .cargo/config.toml"),
    )
}

/// Returns the path to the workspace `testdata/` directory.
#[must_use]
pub fn workspace_testdata() -> PathBuf {
    workspace_root().join("testdata")
}

/// Reads a file relative to the workspace `testdata/` directory.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn read_testdata(relative_path: &str) -> String {
    let path = workspace_testdata().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Copy a file from `testdata/` into `dir`, keeping its file name.
///
/// # Errors
///
/// Returns an error if the fixture cannot be copied.
pub fn copy_testdata(relative_path: &str, dir: &Path) -> eyre::Result<PathBuf> {
    let src = workspace_testdata().join(relative_path);
    let name = src
        .file_name()
        .ok_or_else(|| eyre::eyre!("{} has no file name", src.display()))?;
    let dest = dir.join(name);
    std::fs::copy(&src, &dest)?;
    Ok(dest)
}

/// Write `data` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write(path: &Path, data: impl AsRef<[u8]>) -> eyre::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(path.to_path_buf())
}

pub type LogLevel = tracing::metadata::Level;

static INIT_EYRE: Once = Once::new();

pub struct TestGuard {
    _trace_guard: tracing::subscriber::DefaultGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    log_level: LogLevel,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            log_level: LogLevel::DEBUG,
        }
    }
}

impl Builder {
    /// Initialize test.
    ///
    /// This ensures `color_eyre` is setup once and installs a thread-local
    /// tracing subscriber that lives as long as the returned guard.
    ///
    /// # Panics
    ///
    /// Panics if `color_eyre` installation fails.
    #[must_use]
    pub fn build(self) -> TestGuard {
        INIT_EYRE.call_once(|| {
            color_eyre::install().expect("failed to install eyre");
        });

        let filter = tracing_subscriber::EnvFilter::default().add_directive(
            tracing_subscriber::filter::LevelFilter::from_level(self.log_level).into(),
        );
        let subscriber = tracing_subscriber::fmt()
            .compact()
            .without_time()
            .with_test_writer()
            .with_env_filter(filter)
            .finish();
        TestGuard {
            _trace_guard: tracing::subscriber::set_default(subscriber),
        }
    }

    /// Toggle log level for tracing inside the test.
    #[must_use]
    pub fn with_log_level(mut self, log_level: impl Into<LogLevel>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

/// Create a new builder.
#[must_use]
pub fn builder() -> Builder {
    Builder::default()
}
