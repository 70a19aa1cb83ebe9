//! Symmetry engines.
//!
//! Symmetry detection itself is delegated: primary cells go to a
//! [`PrimarySolver`], hierarchical cells to a [`SystemSymmetry`] engine.
//! The built-in implementations are simple fallbacks used when
//! no external engine is configured.

use std::path::Path;

use cktdb::{CircuitId, Design, DeviceParams, NetId};
use itertools::Itertools;

use crate::request::{ConstGen, InstDesc, PinType};
use crate::sym::SymRecord;

/// Derives symmetry records for a primary cell from its constraint request.
pub trait PrimarySolver {
    /// Solves the given request.
    fn solve(&self, req: &ConstGen) -> anyhow::Result<Vec<SymRecord>>;
}

/// Derives symmetry records for a cell containing composite instances.
pub trait SystemSymmetry {
    /// Detects symmetry among the instances of `circuit`.
    ///
    /// `out_dir` is the constraint output directory, available for scratch files.
    fn system_sym(
        &self,
        design: &Design,
        circuit: CircuitId,
        out_dir: &Path,
    ) -> anyhow::Result<Vec<SymRecord>>;
}

/// Pairs matched devices of a primary cell.
///
/// Two instances match when they have the same kind and identical physical
/// parameters, and share an anchor net while their other terminals differ.
/// Transistors are anchored at the source, passives at either terminal.
/// Each instance is paired at most once, in declaration order, and the later
/// instance of a pair is the mirrored one.
#[derive(Copy, Clone, Debug, Default)]
pub struct MatchedDeviceSolver;

fn same_params(a: &DeviceParams, b: &DeviceParams) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() <= 1e-9 * x.abs().max(y.abs());
    a.kind == b.kind && a.count == b.count && close(a.width, b.width) && close(a.length, b.length)
}

fn terminals(inst: &InstDesc, roles: [PinType; 2]) -> Option<[NetId; 2]> {
    Some([inst.net(roles[0])?, inst.net(roles[1])?])
}

impl MatchedDeviceSolver {
    fn matches(a: &InstDesc, b: &InstDesc) -> bool {
        if !same_params(&a.params, &b.params) {
            return false;
        }
        if a.params.kind.is_transistor() {
            let (Some(sa), Some(sb)) = (a.net(PinType::S), b.net(PinType::S)) else {
                return false;
            };
            let (Some([da, ga]), Some([db, gb])) = (
                terminals(a, [PinType::D, PinType::G]),
                terminals(b, [PinType::D, PinType::G]),
            ) else {
                return false;
            };
            sa == sb && da != db && ga != gb
        } else {
            let (Some([a1, a2]), Some([b1, b2])) = (
                terminals(a, [PinType::This, PinType::That]),
                terminals(b, [PinType::This, PinType::That]),
            ) else {
                return false;
            };
            let shared = [a1, a2].iter().filter(|n| [b1, b2].contains(*n)).count();
            shared == 1 && (a1, a2) != (b1, b2)
        }
    }
}

impl PrimarySolver for MatchedDeviceSolver {
    fn solve(&self, req: &ConstGen) -> anyhow::Result<Vec<SymRecord>> {
        let insts = req.insts();
        let mut paired = vec![false; insts.len()];
        let mut records = Vec::new();
        for (i, j) in (0..insts.len()).tuple_combinations() {
            if paired[i] || paired[j] || !Self::matches(&insts[i], &insts[j]) {
                continue;
            }
            paired[i] = true;
            paired[j] = true;
            records.push(SymRecord::pair(
                insts[i].name.clone(),
                insts[j].name.clone(),
            ));
        }
        Ok(records)
    }
}

/// A [`SystemSymmetry`] engine that never reports symmetry.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSystemSymmetry;

impl SystemSymmetry for NoSystemSymmetry {
    fn system_sym(
        &self,
        design: &Design,
        circuit: CircuitId,
        _out_dir: &Path,
    ) -> anyhow::Result<Vec<SymRecord>> {
        tracing::debug!(
            circuit = %design.circuit(circuit).name(),
            "no system symmetry engine configured"
        );
        Ok(Vec::new())
    }
}
