//! The constraint generator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cktdb::{CircuitId, Design};
use tracing::Level;

use crate::error::Result;
use crate::primary::{is_primary, primary_request};
use crate::solver::{MatchedDeviceSolver, NoSystemSymmetry, PrimarySolver, SystemSymmetry};
use crate::sym::{sym_path, write_sym_file, SymmetryMap};

/// Produces and caches the symmetry constraints of circuits.
///
/// Results are memoized per circuit for the lifetime of the generator.
/// The `.sym` artifact in the output directory is the serialized form of a
/// memo entry: when it already exists, for example from an earlier run, it
/// is decoded instead of being regenerated.
pub struct ConstraintGenerator {
    out_dir: PathBuf,
    solver: Box<dyn PrimarySolver>,
    system: Box<dyn SystemSymmetry>,
    memo: HashMap<CircuitId, SymmetryMap>,
    written: usize,
}

impl ConstraintGenerator {
    /// Creates a generator writing artifacts to `out_dir`, using the built-in engines.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            solver: Box::new(MatchedDeviceSolver),
            system: Box::new(NoSystemSymmetry),
            memo: HashMap::new(),
            written: 0,
        }
    }

    /// Sets the engine used for primary cells.
    pub fn with_solver(mut self, solver: impl PrimarySolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    /// Sets the engine used for cells containing composite instances.
    pub fn with_system(mut self, system: impl SystemSymmetry + 'static) -> Self {
        self.system = Box::new(system);
        self
    }

    /// The output directory.
    #[inline]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// The artifact path of the circuit named `name`.
    pub fn sym_path(&self, name: &str) -> PathBuf {
        sym_path(&self.out_dir, name)
    }

    /// The number of artifacts this generator has written.
    #[inline]
    pub fn artifacts_written(&self) -> usize {
        self.written
    }

    /// Returns the symmetry map of `id`, generating its artifact if needed.
    ///
    /// Nothing is written when the circuit is memoized or its artifact
    /// already exists. Any error aborts before the artifact is written.
    pub fn generate(&mut self, design: &Design, id: CircuitId) -> Result<SymmetryMap> {
        let circuit = design.circuit(id);
        let _guard =
            tracing::span!(Level::INFO, "constraints", circuit = %circuit.name()).entered();

        if let Some(map) = self.memo.get(&id) {
            tracing::debug!("reusing memoized constraints");
            return Ok(map.clone());
        }

        let path = self.sym_path(circuit.name());
        if path.is_file() {
            tracing::debug!(path = ?path, "reusing existing constraint artifact");
        } else {
            let records = if is_primary(design, id) {
                tracing::debug!("generating primary cell constraints");
                let req = primary_request(design, id)?;
                self.solver.solve(&req)?
            } else {
                tracing::debug!("generating system symmetry constraints");
                self.system.system_sym(design, id, &self.out_dir)?
            };
            write_sym_file(&path, &records)?;
            self.written += 1;
            tracing::info!(path = ?path, records = records.len(), "wrote constraint artifact");
        }

        let map = SymmetryMap::read(&path)?;
        self.memo.insert(id, map.clone());
        Ok(map)
    }
}
