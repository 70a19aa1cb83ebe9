//! Symmetry constraint generation.
//!
//! The [`ConstraintGenerator`] produces, caches and decodes the symmetry
//! constraints of one circuit at a time:
//!
//! - *Primary* cells, whose instances are all device primitives, are described
//!   by a [`ConstGen`] request (nets, devices with their physical parameters,
//!   and positional pin roles) and solved by a [`PrimarySolver`].
//! - All other cells are handed to a [`SystemSymmetry`] engine.
//!
//! Either way the result is serialized as a `.sym` artifact and decoded into a
//! [`SymmetryMap`] from instance name to the name of its mirror image.
#![warn(missing_docs)]

pub mod error;
pub mod generator;
pub mod init_obj;
pub mod primary;
pub mod request;
pub mod solver;
pub mod sym;

#[cfg(test)]
pub(crate) mod tests;

pub use generator::ConstraintGenerator;
pub use primary::{is_primary, primary_request};
pub use request::{ConstGen, PinType};
pub use solver::{MatchedDeviceSolver, NoSystemSymmetry, PrimarySolver, SystemSymmetry};
pub use sym::{SymRecord, SymmetryMap};
