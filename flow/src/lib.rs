//! Hierarchical layout flow.
//!
//! A [`Flow`] implements a circuit hierarchy bottom-up. Every circuit
//! definition reachable from the root is implemented exactly once, after all
//! of the composite circuits it instantiates:
//!
//! - device primitives are generated by a [`DeviceGenerator`](strategy::DeviceGenerator);
//! - standard cells are set up by a [`StdCellGenerator`](strategy::StdCellGenerator);
//! - all other circuits get symmetry constraints from a
//!   [`ConstraintGenerator`], have their instances configured accordingly and
//!   are then placed by a [`Placer`](strategy::Placer).
//!
//! Routing is deferred until the whole hierarchy has been placed.
#![warn(missing_docs)]

use std::collections::HashSet;
use std::fmt::Display;
use std::mem;
use std::time::{Duration, Instant};

use anyhow::Context;
use arcstr::ArcStr;
use cktdb::{CircuitId, Design, NodeId};
use constgen::{ConstraintGenerator, SymmetryMap};
use tracing::Level;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::strategy::{PlacementHandle, Strategies};

pub mod db;
pub mod error;
pub mod params;
pub mod strategy;

#[cfg(test)]
pub(crate) mod tests;

/// The strategy a circuit definition was implemented with.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Dispatch {
    /// Generated as a device primitive.
    Device,
    /// Set up as a standard cell.
    StdCell,
    /// Placed from its instances.
    Placement,
}

impl Display for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::StdCell => write!(f, "standard cell"),
            Self::Placement => write!(f, "placement"),
        }
    }
}

/// A summary of a flow run.
#[derive(Clone, Debug, Default)]
pub struct FlowReport {
    /// The implemented circuit definitions, in implementation order.
    pub implemented: Vec<(ArcStr, Dispatch)>,
    /// The number of device instances generated while setting up placed circuits.
    pub device_instances: usize,
    /// The number of placements routed.
    pub routed: usize,
    /// The total time reported by the placer.
    pub placement_runtime: Duration,
    /// The wall time spent implementing the hierarchy, excluding routing.
    pub hierarchy_time: Duration,
}

impl FlowReport {
    /// The number of circuit definitions implemented with `dispatch`.
    pub fn count(&self, dispatch: Dispatch) -> usize {
        self.implemented
            .iter()
            .filter(|(_, d)| *d == dispatch)
            .count()
    }
}

/// A bottom-up layout flow.
pub struct Flow {
    params: Params,
    strategies: Strategies,
    constraints: ConstraintGenerator,
    placements: Vec<PlacementHandle>,
    /// Circuits whose children are being implemented.
    in_progress: HashSet<CircuitId>,
    report: FlowReport,
}

impl Flow {
    /// Creates a flow writing constraints to the result directory with the built-in engines.
    pub fn new(params: Params, strategies: Strategies) -> Self {
        let constraints = ConstraintGenerator::new(params.result_dir.clone());
        Self {
            params,
            strategies,
            constraints,
            placements: Vec::new(),
            in_progress: HashSet::new(),
            report: FlowReport::default(),
        }
    }

    /// Replaces the constraint generator.
    pub fn with_constraints(mut self, constraints: ConstraintGenerator) -> Self {
        self.constraints = constraints;
        self
    }

    /// The flow parameters.
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The constraint generator.
    #[inline]
    pub fn constraints(&self) -> &ConstraintGenerator {
        &self.constraints
    }

    /// Returns `true` if circuit `id` is implemented as a standard cell.
    pub fn is_std_cell(&self, design: &Design, id: CircuitId) -> bool {
        self.params.is_std_cell(design.circuit(id).name())
    }

    /// Implements the hierarchy under the root of `design`, then routes every placement.
    pub fn run(&mut self, design: &mut Design) -> Result<FlowReport> {
        let root = match design.root() {
            Some(root) => root,
            None => design.find_root().ok_or(Error::NoRoot)?,
        };
        let _guard =
            tracing::span!(Level::INFO, "flow", root = %design.circuit(root).name()).entered();

        let start = Instant::now();
        if !design.circuit(root).is_implemented() {
            self.implement(design, root)?;
        }
        self.report.hierarchy_time = start.elapsed();
        tracing::info!(
            runtime = ?self.report.hierarchy_time,
            placement_runtime = ?self.report.placement_runtime,
            "implemented hierarchy"
        );

        for handle in mem::take(&mut self.placements) {
            tracing::info!(cell = %handle.cell, "routing");
            self.strategies
                .router
                .route_only(&handle)
                .with_context(|| format!("failed to route `{}`", handle.cell))?;
            self.report.routed += 1;
        }

        Ok(mem::take(&mut self.report))
    }

    /// Implements circuit `id` and, first, every composite circuit it
    /// instantiates that is not yet implemented.
    ///
    /// Fails with [`Error::Cycle`] if `id` is reached again through its own instances.
    pub fn implement(&mut self, design: &mut Design, id: CircuitId) -> Result<()> {
        let name = design.circuit(id).name().clone();
        let _guard = tracing::span!(Level::INFO, "implement", cell = %name).entered();

        if design.circuit(id).is_device() {
            self.strategies
                .device
                .generate(design, id, &self.params.gds_dir(), false)
                .with_context(|| format!("failed to generate device `{name}`"))?;
            self.finish(design, id, Dispatch::Device);
            return Ok(());
        }

        if self.is_std_cell(design, id) {
            self.strategies
                .std_cell
                .setup(design, id, &self.params.result_dir)
                .with_context(|| format!("failed to set up standard cell `{name}`"))?;
            self.finish(design, id, Dispatch::StdCell);
            return Ok(());
        }

        if !self.in_progress.insert(id) {
            return Err(Error::Cycle { circuit: name });
        }
        let result = self.implement_composite(design, id, &name);
        self.in_progress.remove(&id);
        result
    }

    fn implement_composite(
        &mut self,
        design: &mut Design,
        id: CircuitId,
        name: &str,
    ) -> Result<()> {
        let children: Vec<CircuitId> = design
            .circuit(id)
            .nodes()
            .filter(|&(node_id, _)| !design.is_leaf(id, node_id))
            .map(|(_, node)| node.graph())
            .collect();
        for child in children {
            if !design.circuit(child).is_implemented() {
                self.implement(design, child)?;
            }
        }

        let sym = self.constraints.generate(design, id)?;
        self.setup(design, id, sym)?;

        let placement = self
            .strategies
            .placer
            .place_only(design, id, &self.params.result_dir)
            .with_context(|| format!("failed to place `{name}`"))?;
        tracing::debug!(runtime = ?placement.runtime, "placed");
        self.report.placement_runtime += placement.runtime;
        self.placements.push(placement.handle);
        self.finish(design, id, Dispatch::Placement);
        Ok(())
    }

    /// Configures the instances of circuit `id` from its symmetry map.
    ///
    /// An instance is mirrored when it is the counterpart of another instance
    /// in `sym`. Device instances are generated, mirrored if needed, and
    /// their layout is loaded. Other mirrored instances are flagged for a
    /// vertical flip.
    pub fn setup(&mut self, design: &mut Design, id: CircuitId, sym: SymmetryMap) -> Result<()> {
        let gds_dir = self.params.gds_dir();
        let nodes: Vec<(NodeId, CircuitId, bool)> = design
            .circuit(id)
            .nodes()
            .map(|(node_id, node)| (node_id, node.graph(), sym.is_mirrored(node.name())))
            .collect();

        for (node_id, child, mirror) in nodes {
            if design.is_leaf(id, node_id) {
                let device = design.circuit(child).name().clone();
                tracing::debug!(%device, mirror, "generating device instance");
                self.strategies
                    .device
                    .generate(design, child, &gds_dir, mirror)
                    .with_context(|| format!("failed to generate device `{device}`"))?;
                self.strategies
                    .device
                    .read_gds(design, child, &gds_dir)
                    .with_context(|| format!("failed to read layout of device `{device}`"))?;
                self.report.device_instances += 1;
            } else if mirror {
                design.circuit_mut(id).node_mut(node_id).set_flip_vert(true);
            }
        }
        Ok(())
    }

    /// Generates the symmetry constraints of every circuit that is neither a
    /// device primitive nor a standard cell, without implementing anything.
    pub fn generate_constraints(
        &mut self,
        design: &Design,
    ) -> Result<Vec<(CircuitId, SymmetryMap)>> {
        let ids: Vec<CircuitId> = design
            .circuits()
            .filter(|(id, circuit)| !circuit.is_device() && !self.is_std_cell(design, *id))
            .map(|(id, _)| id)
            .collect();
        let mut maps = Vec::with_capacity(ids.len());
        for id in ids {
            maps.push((id, self.constraints.generate(design, id)?));
        }
        Ok(maps)
    }

    fn finish(&mut self, design: &mut Design, id: CircuitId, dispatch: Dispatch) {
        let circuit = design.circuit_mut(id);
        circuit.set_implemented(true);
        tracing::info!(cell = %circuit.name(), %dispatch, "implemented");
        self.report
            .implemented
            .push((circuit.name().clone(), dispatch));
    }
}
