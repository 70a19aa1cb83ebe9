//! Script tool error types.

use std::path::PathBuf;
use std::process::ExitStatus;

/// A result type returning script tool errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for script tool functions.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A run script exited unsuccessfully.
    #[error("`{script}` exited with {status}")]
    Failed {
        /// The run script.
        script: PathBuf,
        /// The exit status of the script.
        status: ExitStatus,
    },
    /// A stage completed without producing the layout it was expected to write.
    #[error("expected layout `{0}` was not produced")]
    MissingLayout(PathBuf),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A template could not be rendered.
    #[error("template error: {0}")]
    Tera(#[from] tera::Error),
}
