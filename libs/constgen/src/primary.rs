//! Primary cell classification and request construction.

use cktdb::{CircuitId, Design};
use tracing::Level;

use crate::error::{Error, Registration, Result};
use crate::request::{pin_types, ConstGen};

/// Returns `true` if every instance of the circuit instantiates a device primitive.
///
/// A circuit with no instances is primary.
pub fn is_primary(design: &Design, id: CircuitId) -> bool {
    design
        .circuit(id)
        .nodes()
        .all(|(_, node)| design.circuit(node.graph()).is_device())
}

/// Fails with [`Error::IndexMismatch`] unless a registration handle equals the registered index.
pub(crate) fn ensure_stable(what: Registration, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        tracing::error!(%what, expected, actual, "registration index mismatch");
        return Err(Error::IndexMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Builds the constraint request of a primary cell.
///
/// Every net is registered under its index, then every instance with its
/// device parameters and positional pin roles. Fails if an instance is not a
/// device primitive, if a device has no technology entry, or if a
/// registration handle differs from the index of the registered object.
pub fn primary_request(design: &Design, id: CircuitId) -> Result<ConstGen> {
    let circuit = design.circuit(id);
    let _guard =
        tracing::span!(Level::DEBUG, "primary request", circuit = %circuit.name()).entered();
    let mut req = ConstGen::new();

    for (net_id, net) in circuit.nets() {
        let handle = req.add_net(net.name().clone(), net_id);
        ensure_stable(Registration::Net, net_id.0, handle)?;
    }

    for (node_id, node) in circuit.nodes() {
        let child = design.circuit(node.graph());
        let Some(kind) = child.impl_type().device_kind() else {
            return Err(Error::NonInstanceInComposite {
                circuit: circuit.name().clone(),
                instance: node.name().clone(),
            });
        };
        let params = design.device_params(node.graph())?;
        let handle = req.add_inst(node.name().clone(), params);
        let roles = pin_types(kind);
        for (pos, net) in circuit.node_nets(node_id).enumerate() {
            let Some(&pin_type) = roles.get(pos) else {
                tracing::warn!(
                    instance = %node.name(),
                    pos,
                    "ignoring pin without a {} role",
                    kind
                );
                continue;
            };
            req.add_inst_pin(handle, net, pin_type);
        }
        ensure_stable(Registration::Instance, node_id.0, handle)?;
    }

    Ok(req)
}
