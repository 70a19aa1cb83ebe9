//! Constraint generation error types.

use std::fmt::Display;

use arcstr::ArcStr;

/// A result type returning constraint generation errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of object registered with a constraint request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Registration {
    /// A net.
    Net,
    /// A device instance.
    Instance,
}

impl Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Net => write!(f, "net"),
            Self::Instance => write!(f, "instance"),
        }
    }
}

/// The error type for constraint generation.
///
/// [`Error::IndexMismatch`] and [`Error::NonInstanceInComposite`] indicate a
/// malformed circuit graph and must abort the flow.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A registration handle did not equal the index of the registered object.
    #[error("{what} registration returned handle {actual}, expected {expected}")]
    IndexMismatch {
        /// What was being registered.
        what: Registration,
        /// The index of the registered object.
        expected: usize,
        /// The handle returned by the request.
        actual: usize,
    },
    /// A circuit classified as primary instantiates a non-device circuit.
    #[error("circuit `{circuit}` contains non-device instance `{instance}`")]
    NonInstanceInComposite {
        /// The name of the parent circuit.
        circuit: ArcStr,
        /// The name of the offending instance.
        instance: ArcStr,
    },
    /// A circuit database lookup failed.
    #[error(transparent)]
    Db(#[from] cktdb::error::Error),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An external symmetry engine failed.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}
