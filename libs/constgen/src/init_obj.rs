//! `.initObj` export.
//!
//! The `.initObj` format is the input of external constraint engines that
//! work from an explicit device list rather than a [`ConstGen`](crate::request::ConstGen)
//! request. Dimensions are written as integer picometres.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use cktdb::{CircuitId, Design, DeviceKind};

use crate::error::{Error, Result};

fn picometres(metres: f64) -> i64 {
    (metres * 1e12).round() as i64
}

/// Renders the `.initObj` description of a primary cell.
pub fn render_init_obj(design: &Design, id: CircuitId) -> Result<String> {
    let circuit = design.circuit(id);
    let mut out = String::new();

    for (inst_id, (node_id, node)) in circuit.nodes().enumerate() {
        let child = design.circuit(node.graph());
        if !child.is_device() {
            return Err(Error::NonInstanceInComposite {
                circuit: circuit.name().clone(),
                instance: node.name().clone(),
            });
        }
        let params = design.device_params(node.graph())?;
        let tag = match params.kind {
            DeviceKind::Nmos => "NMOS",
            DeviceKind::Pmos => "PMOS",
            DeviceKind::Resistor => "RES",
            DeviceKind::Capacitor => "CAP",
        };
        let w = picometres(params.width);
        let l = picometres(params.length);
        // Infallible: writing to a `String`.
        let _ = writeln!(out, "Inst\n{inst_id}\n{tag}\n{}", node.name());
        let _ = if params.kind.is_transistor() {
            writeln!(out, "{w}e-12 {l}e-12 {}", params.count)
        } else {
            writeln!(out, "{w}e-12 {l}e-12")
        };
        for net in circuit.node_nets(node_id) {
            let _ = writeln!(out, "{}", net.0);
        }
    }

    for (net_id, net) in circuit.nets() {
        let _ = writeln!(out, "NET\n{}\n{}", net_id.0, net.name());
    }

    Ok(out)
}

/// Writes `<dir>/<name>.initObj` for a primary cell, returning the path written.
pub fn write_init_obj(design: &Design, id: CircuitId, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let contents = render_init_obj(design, id)?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.initObj", design.circuit(id).name()));
    fs::write(&path, contents)?;
    Ok(path)
}
