//! Flow error types.

use std::path::PathBuf;

use arcstr::ArcStr;

/// A result type returning flow errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for the layout flow.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No netlist was configured.
    #[error("no netlist configured")]
    MissingNetlist,
    /// The design has no root circuit.
    #[error("design has no root circuit")]
    NoRoot,
    /// A circuit instantiates itself through its hierarchy.
    #[error("circuit `{circuit}` instantiates itself through its hierarchy")]
    Cycle {
        /// The circuit reached again while it was being implemented.
        circuit: ArcStr,
    },
    /// Validation of the circuit graph found errors.
    #[error("circuit graph has {num_errors} error(s)")]
    InvalidDesign {
        /// The number of error-severity issues found.
        num_errors: usize,
    },
    /// An input file could not be read.
    #[error("failed to read `{path}`")]
    Read {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// An input file could not be parsed.
    #[error("failed to parse `{path}`")]
    Parse {
        /// The file that was being parsed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// Constraint generation failed.
    #[error(transparent)]
    Constraint(#[from] constgen::error::Error),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A physical implementation strategy failed.
    #[error(transparent)]
    Strategy(#[from] anyhow::Error),
}
