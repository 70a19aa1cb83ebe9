//! Circuit graph validation.
//!
//! Checks the structural invariants a layout flow relies on before any
//! circuit is implemented.

use std::collections::HashSet;
use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::{CircuitId, Design};

/// An enumeration of possible severity levels.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Fatal when loading a design.
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The cause of a validation issue.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// Two circuits have the same name.
    DuplicateCircuitNames {
        id1: CircuitId,
        id2: CircuitId,
        name: ArcStr,
    },
    /// Two instances in the same circuit have the same name.
    DuplicateInstanceNames {
        inst_name: ArcStr,
        circuit_name: ArcStr,
    },
    /// Two nets in the same circuit have the same name.
    DuplicateNetNames {
        net_name: ArcStr,
        circuit_name: ArcStr,
    },
    /// An instance references a circuit not present in the design.
    MissingChildCircuit {
        child: CircuitId,
        parent_name: ArcStr,
        inst_name: ArcStr,
    },
    /// A pin or body connection references a net not present in the circuit.
    MissingNet {
        net: usize,
        circuit_name: ArcStr,
    },
    /// A device primitive contains instances.
    DeviceWithInstances { circuit_name: ArcStr },
    /// An instance of a device has more pins than the device has pin roles.
    TooManyDevicePins {
        inst_name: ArcStr,
        parent_name: ArcStr,
        pins: usize,
        roles: usize,
    },
    /// A composite circuit has no instances.
    EmptyCircuit { circuit_name: ArcStr },
    /// An instance references a pin not present in its parent circuit.
    MissingPin {
        pin: usize,
        inst_name: ArcStr,
        circuit_name: ArcStr,
    },
    /// An instance references a pin owned by another instance.
    MisownedPin {
        pin: usize,
        inst_name: ArcStr,
        circuit_name: ArcStr,
    },
    /// A circuit instantiates itself, directly or through its descendants.
    CyclicHierarchy {
        circuit_name: ArcStr,
        inst_name: ArcStr,
        parent_name: ArcStr,
    },
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateCircuitNames { name, .. } => write!(
                f,
                "duplicate circuit names: found two or more circuits named `{}`",
                name
            ),
            Self::DuplicateInstanceNames {
                inst_name,
                circuit_name,
            } => write!(
                f,
                "duplicate instance names: found two or more instances named `{}` in circuit `{}`",
                inst_name, circuit_name
            ),
            Self::DuplicateNetNames {
                net_name,
                circuit_name,
            } => write!(
                f,
                "duplicate net names: found two or more nets named `{}` in circuit `{}`",
                net_name, circuit_name
            ),
            Self::MissingChildCircuit {
                child,
                parent_name,
                inst_name,
            } => write!(
                f,
                "missing child circuit: instance `{}` in circuit `{}` references {}, \
                 which does not exist",
                inst_name, parent_name, child
            ),
            Self::MissingNet { net, circuit_name } => write!(
                f,
                "missing net: circuit `{}` references net index {}, which does not exist",
                circuit_name, net
            ),
            Self::DeviceWithInstances { circuit_name } => write!(
                f,
                "device primitive `{}` contains instances",
                circuit_name
            ),
            Self::TooManyDevicePins {
                inst_name,
                parent_name,
                pins,
                roles,
            } => write!(
                f,
                "instance `{}` in circuit `{}` has {} pins, but its device has only {} pin roles",
                inst_name, parent_name, pins, roles
            ),
            Self::EmptyCircuit { circuit_name } => {
                write!(f, "circuit `{}` has no instances", circuit_name)
            }
            Self::MissingPin {
                pin,
                inst_name,
                circuit_name,
            } => write!(
                f,
                "missing pin: instance `{}` in circuit `{}` references pin index {}, \
                 which does not exist",
                inst_name, circuit_name, pin
            ),
            Self::MisownedPin {
                pin,
                inst_name,
                circuit_name,
            } => write!(
                f,
                "instance `{}` in circuit `{}` references pin index {}, \
                 which belongs to another instance",
                inst_name, circuit_name, pin
            ),
            Self::CyclicHierarchy {
                circuit_name,
                inst_name,
                parent_name,
            } => write!(
                f,
                "cyclic hierarchy: circuit `{}` instantiates itself through instance `{}` \
                 in circuit `{}`",
                circuit_name, inst_name, parent_name
            ),
        }
    }
}

/// An issue identified during validation of a design.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidatorIssue {
    cause: Cause,
    severity: Severity,
}

impl ValidatorIssue {
    /// Creates a new validator issue and logs it immediately.
    ///
    /// The log level is selected according to the given severity.
    fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self { cause, severity };
        match severity {
            Severity::Info => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            Severity::Error => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
        }
        result
    }

    /// The underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// The severity of this issue.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for ValidatorIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.cause)
    }
}

/// A collection of validation issues.
#[derive(Clone, Debug, Default)]
pub struct IssueSet {
    issues: Vec<ValidatorIssue>,
    num_errors: usize,
    num_warnings: usize,
}

impl IssueSet {
    fn add(&mut self, cause: Cause, severity: Severity) {
        match severity {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        }
        self.issues.push(ValidatorIssue::new_and_log(cause, severity));
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ValidatorIssue> {
        self.issues.iter()
    }

    /// The number of issues in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `true` if the set contains an error.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    /// The number of errors in the set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// The number of warnings in the set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }
}

impl Display for IssueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl Design {
    /// Validates the design, logging and returning every issue found.
    pub fn validate(&self) -> IssueSet {
        let _guard = tracing::span!(Level::INFO, "validating design").entered();
        let mut issues = IssueSet::default();

        let mut names = std::collections::HashMap::new();
        for (id, circuit) in self.circuits() {
            if let Some(&prev) = names.get(circuit.name()) {
                issues.add(
                    Cause::DuplicateCircuitNames {
                        id1: prev,
                        id2: id,
                        name: circuit.name().clone(),
                    },
                    Severity::Error,
                );
            } else {
                names.insert(circuit.name().clone(), id);
            }
        }

        for (_, circuit) in self.circuits() {
            let circuit_name = circuit.name();

            let mut net_names = HashSet::new();
            for (_, net) in circuit.nets() {
                if !net_names.insert(net.name()) {
                    issues.add(
                        Cause::DuplicateNetNames {
                            net_name: net.name().clone(),
                            circuit_name: circuit_name.clone(),
                        },
                        Severity::Error,
                    );
                }
            }

            for net in circuit.psubs().iter().chain(circuit.nwells()) {
                if circuit.try_net(*net).is_none() {
                    issues.add(
                        Cause::MissingNet {
                            net: net.0,
                            circuit_name: circuit_name.clone(),
                        },
                        Severity::Error,
                    );
                }
            }

            if circuit.is_device() {
                if circuit.num_nodes() > 0 {
                    issues.add(
                        Cause::DeviceWithInstances {
                            circuit_name: circuit_name.clone(),
                        },
                        Severity::Error,
                    );
                }
                continue;
            }

            if circuit.num_nodes() == 0 {
                issues.add(
                    Cause::EmptyCircuit {
                        circuit_name: circuit_name.clone(),
                    },
                    Severity::Info,
                );
            }

            let mut inst_names = HashSet::new();
            for (node_id, node) in circuit.nodes() {
                if !inst_names.insert(node.name()) {
                    issues.add(
                        Cause::DuplicateInstanceNames {
                            inst_name: node.name().clone(),
                            circuit_name: circuit_name.clone(),
                        },
                        Severity::Error,
                    );
                }

                let mut pins_valid = true;
                for &pin_id in node.pins() {
                    let cause = match circuit.try_pin(pin_id) {
                        None => Cause::MissingPin {
                            pin: pin_id.0,
                            inst_name: node.name().clone(),
                            circuit_name: circuit_name.clone(),
                        },
                        Some(pin) if pin.node != node_id => Cause::MisownedPin {
                            pin: pin_id.0,
                            inst_name: node.name().clone(),
                            circuit_name: circuit_name.clone(),
                        },
                        Some(_) => continue,
                    };
                    issues.add(cause, Severity::Error);
                    pins_valid = false;
                }

                if pins_valid {
                    for net in circuit.node_nets(node_id) {
                        if circuit.try_net(net).is_none() {
                            issues.add(
                                Cause::MissingNet {
                                    net: net.0,
                                    circuit_name: circuit_name.clone(),
                                },
                                Severity::Error,
                            );
                        }
                    }
                }

                let Some(child) = self.try_circuit(node.graph()) else {
                    issues.add(
                        Cause::MissingChildCircuit {
                            child: node.graph(),
                            parent_name: circuit_name.clone(),
                            inst_name: node.name().clone(),
                        },
                        Severity::Error,
                    );
                    continue;
                };

                if let Some(kind) = child.impl_type().device_kind() {
                    let roles = kind.num_pin_roles();
                    if node.num_pins() > roles {
                        issues.add(
                            Cause::TooManyDevicePins {
                                inst_name: node.name().clone(),
                                parent_name: circuit_name.clone(),
                                pins: node.num_pins(),
                                roles,
                            },
                            Severity::Error,
                        );
                    }
                }
            }
        }

        self.check_hierarchy(&mut issues);
        issues
    }

    /// Reports every instance that closes a cycle in the circuit hierarchy.
    fn check_hierarchy(&self, issues: &mut IssueSet) {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let n = self.circuits.len();
        let mut marks = vec![Mark::Unvisited; n];
        for start in 0..n {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::OnPath;
            // Each entry is a circuit on the current path and the index of its next instance.
            let mut stack = vec![(start, 0)];
            while let Some(top) = stack.last_mut() {
                let (idx, next) = *top;
                top.1 += 1;
                let parent = &self.circuits[idx];
                let Some(node) = parent.nodes.get(next) else {
                    marks[idx] = Mark::Done;
                    stack.pop();
                    continue;
                };
                let child = node.graph.0;
                if child >= n {
                    continue;
                }
                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::OnPath;
                        stack.push((child, 0));
                    }
                    Mark::OnPath => issues.add(
                        Cause::CyclicHierarchy {
                            circuit_name: self.circuits[child].name.clone(),
                            inst_name: node.name.clone(),
                            parent_name: parent.name.clone(),
                        },
                        Severity::Error,
                    ),
                    Mark::Done => (),
                }
            }
        }
    }
}
