//! Circuit database error types.

use arcstr::ArcStr;

use crate::DeviceKind;

/// A result type returning circuit database errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for circuit database functions.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The technology database has no entry for a device.
    #[error("no technology entry {idx} for {kind} devices")]
    MissingTechEntry {
        /// The device kind that was looked up.
        kind: DeviceKind,
        /// The implementation index that was looked up.
        idx: usize,
    },
    /// A device-only query was made on a circuit that is not a device primitive.
    #[error("circuit `{0}` is not a device primitive")]
    NotADevice(ArcStr),
}
