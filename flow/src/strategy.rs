//! Physical implementation strategies.
//!
//! The flow never builds geometry itself. Each circuit is handed to exactly
//! one strategy: device primitives to a [`DeviceGenerator`], standard cells to
//! a [`StdCellGenerator`], everything else to a [`Placer`]. Placed circuits
//! are routed by a [`Router`] once the whole hierarchy has been placed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arcstr::ArcStr;
use cktdb::{CircuitId, Design};

/// Generates the layout of device primitives.
pub trait DeviceGenerator {
    /// Generates the layout of device `id` into `out_dir`.
    ///
    /// If `flip` is set, the layout is mirrored.
    fn generate(&self, design: &Design, id: CircuitId, out_dir: &Path, flip: bool)
        -> anyhow::Result<()>;

    /// Loads the generated layout of device `id` from `out_dir` into the design.
    fn read_gds(&self, design: &mut Design, id: CircuitId, out_dir: &Path) -> anyhow::Result<()>;
}

/// Implements circuits backed by standard cell layouts.
pub trait StdCellGenerator {
    /// Sets up the standard cell layout of circuit `id`.
    fn setup(&self, design: &mut Design, id: CircuitId, out_dir: &Path) -> anyhow::Result<()>;
}

/// Places composite circuits.
pub trait Placer {
    /// Places circuit `id`, deferring routing.
    fn place_only(&self, design: &Design, id: CircuitId, out_dir: &Path)
        -> anyhow::Result<Placement>;
}

/// Routes placed circuits.
pub trait Router {
    /// Routes the placement identified by `handle`.
    fn route_only(&self, handle: &PlacementHandle) -> anyhow::Result<()>;
}

/// Identifies a placed circuit awaiting routing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlacementHandle {
    /// The placed circuit.
    pub circuit: CircuitId,
    /// The name of the placed circuit.
    pub cell: ArcStr,
    /// The directory placement results were written to.
    pub out_dir: PathBuf,
}

impl PlacementHandle {
    /// Creates a handle for circuit `id` of `design`, placed into `out_dir`.
    pub fn new(design: &Design, id: CircuitId, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            circuit: id,
            cell: design.circuit(id).name().clone(),
            out_dir: out_dir.into(),
        }
    }
}

/// The result of placing a circuit.
#[derive(Clone, Debug)]
pub struct Placement {
    /// The handle used to route the placement later.
    pub handle: PlacementHandle,
    /// The time spent placing.
    pub runtime: Duration,
}

/// The set of strategies used by a flow.
pub struct Strategies {
    /// Generates device primitives.
    pub device: Box<dyn DeviceGenerator>,
    /// Implements standard cells.
    pub std_cell: Box<dyn StdCellGenerator>,
    /// Places composite circuits.
    pub placer: Box<dyn Placer>,
    /// Routes placed circuits.
    pub router: Box<dyn Router>,
}

impl Strategies {
    /// Uses one tool for every strategy.
    pub fn uniform<T>(tool: T) -> Self
    where
        T: DeviceGenerator + StdCellGenerator + Placer + Router + Clone + 'static,
    {
        Self {
            device: Box::new(tool.clone()),
            std_cell: Box::new(tool.clone()),
            placer: Box::new(tool.clone()),
            router: Box::new(tool),
        }
    }
}
