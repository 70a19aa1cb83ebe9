//! Net classification passes run after a design is loaded.

use crate::Design;

impl Design {
    /// Marks supply and ground nets in every circuit.
    ///
    /// Body connections are used first: p-substrate nets are ground and
    /// n-well nets are supplies. Nets named in `vdd_names` or `vss_names`
    /// are then marked accordingly.
    pub fn mark_power_nets<S: AsRef<str>>(&mut self, vdd_names: &[S], vss_names: &[S]) {
        for circuit in self.circuits.iter_mut() {
            for net in circuit.psubs.iter() {
                if let Some(net) = circuit.nets.get_mut(net.0) {
                    net.mark_vss();
                }
            }
            for net in circuit.nwells.iter() {
                if let Some(net) = circuit.nets.get_mut(net.0) {
                    net.mark_vdd();
                }
            }
            for net in circuit.nets.iter_mut() {
                if vdd_names.iter().any(|n| n.as_ref() == net.name().as_str()) {
                    net.mark_vdd();
                }
                if vss_names.iter().any(|n| n.as_ref() == net.name().as_str()) {
                    net.mark_vss();
                }
            }
        }
    }

    /// Marks nets named in `digital_names` as digital and all others as analog.
    pub fn mark_digital_nets<S: AsRef<str>>(&mut self, digital_names: &[S]) {
        for circuit in self.circuits.iter_mut() {
            for net in circuit.nets.iter_mut() {
                if digital_names.iter().any(|n| n.as_ref() == net.name().as_str()) {
                    net.mark_digital();
                } else {
                    net.mark_analog();
                }
            }
        }
    }
}
