//! Circuit graph database.
//!
//! A [`Design`] is an arena of circuit definitions ([`Circuit`]s) addressed by
//! stable integer indices ([`CircuitId`]). Each circuit owns its instances
//! ([`Node`]s), [`Net`]s and [`Pin`]s, again addressed by index within the
//! circuit. Circuits are either device primitives (transistors, resistors,
//! capacitors), whose physical parameters live in the technology property
//! database ([`PhyPropDb`]), or composites built from instances of other circuits.
//!
//! All mutation performed by a layout flow (the implemented marker and the
//! per-instance mirror flag) goes through the arena, so there is never a
//! stale reference to a circuit after a recursive call.
#![warn(missing_docs)]

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod phy;
mod post;
pub mod validation;


pub use phy::{CapProp, DeviceParams, MosProp, PhyPropDb, ResProp};

use crate::error::{Error, Result};

/// An opaque circuit identifier.
///
/// Equal to the position of the circuit in its [`Design`].
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CircuitId(pub usize);

/// An instance identifier, local to the parent circuit.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// A net identifier, local to the owning circuit.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetId(pub usize);

/// A pin identifier, local to the circuit containing the pin's instance.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PinId(pub usize);

impl Display for CircuitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ckt{}", self.0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

impl Display for NetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "net{}", self.0)
    }
}

/// The kinds of device primitives.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// An n-channel transistor.
    Nmos,
    /// A p-channel transistor.
    Pmos,
    /// A resistor.
    Resistor,
    /// A capacitor.
    Capacitor,
}

impl DeviceKind {
    /// Returns `true` for transistor kinds.
    #[inline]
    pub fn is_transistor(&self) -> bool {
        matches!(self, Self::Nmos | Self::Pmos)
    }

    /// The number of positional pin roles a device of this kind has.
    ///
    /// Transistors have drain, gate, source and body.
    /// Passives have this, that and other.
    #[inline]
    pub fn num_pin_roles(&self) -> usize {
        if self.is_transistor() {
            4
        } else {
            3
        }
    }
}

impl Display for DeviceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nmos => write!(f, "nmos"),
            Self::Pmos => write!(f, "pmos"),
            Self::Resistor => write!(f, "resistor"),
            Self::Capacitor => write!(f, "capacitor"),
        }
    }
}

/// How a circuit is physically implemented.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImplType {
    /// No implementation selected yet.
    ///
    /// Regular sub-circuits read from a netlist carry this tag.
    #[default]
    Unset,
    /// A parameterized device primitive.
    Device(DeviceKind),
    /// An explicitly composite circuit.
    Composite,
}

impl ImplType {
    /// Returns `true` if this is a device primitive.
    #[inline]
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }

    /// The device kind, if this is a device primitive.
    #[inline]
    pub fn device_kind(&self) -> Option<DeviceKind> {
        match *self {
            Self::Device(kind) => Some(kind),
            _ => None,
        }
    }
}

impl Display for ImplType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "UNSET"),
            Self::Device(DeviceKind::Nmos) => write!(f, "PCELL_NCH"),
            Self::Device(DeviceKind::Pmos) => write!(f, "PCELL_PCH"),
            Self::Device(DeviceKind::Resistor) => write!(f, "PCELL_RES"),
            Self::Device(DeviceKind::Capacitor) => write!(f, "PCELL_CAP"),
            Self::Composite => write!(f, "COMPOSITE"),
        }
    }
}

/// Power and signal classification of a net.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetFlags {
    /// A positive supply net.
    pub vdd: bool,
    /// A ground net.
    pub vss: bool,
    /// A digital signal net.
    pub digital: bool,
    /// An analog signal net.
    pub analog: bool,
}

/// A net in a circuit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Net {
    name: ArcStr,
    #[serde(default)]
    flags: NetFlags,
}

impl Net {
    /// The name of the net, unique within its circuit.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The classification flags of this net.
    #[inline]
    pub fn flags(&self) -> NetFlags {
        self.flags
    }

    /// Marks this net as a positive supply.
    #[inline]
    pub fn mark_vdd(&mut self) {
        self.flags.vdd = true;
    }

    /// Marks this net as ground.
    #[inline]
    pub fn mark_vss(&mut self) {
        self.flags.vss = true;
    }

    /// Marks this net as a digital signal.
    #[inline]
    pub fn mark_digital(&mut self) {
        self.flags.digital = true;
    }

    /// Marks this net as an analog signal.
    #[inline]
    pub fn mark_analog(&mut self) {
        self.flags.analog = true;
    }
}

/// A connection between an instance and a net of the parent circuit.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// The instance owning this pin.
    pub node: NodeId,
    /// The net of the parent circuit this pin connects to.
    pub net: NetId,
}

/// An instance of a child circuit placed inside a parent circuit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    name: ArcStr,
    /// The circuit being instantiated.
    graph: CircuitId,
    /// Pins in positional order.
    #[serde(default)]
    pins: Vec<PinId>,
    /// Whether the instance is laid out as the mirror image of its symmetric counterpart.
    #[serde(default)]
    flip_vert: bool,
}

impl Node {
    /// The name of this instance, unique within its parent.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The ID of the instantiated circuit.
    #[inline]
    pub fn graph(&self) -> CircuitId {
        self.graph
    }

    /// The pins of this instance, in positional order.
    #[inline]
    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }

    /// The number of pins of this instance.
    #[inline]
    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    /// Whether this instance should be mirrored during placement.
    #[inline]
    pub fn flip_vert(&self) -> bool {
        self.flip_vert
    }

    /// Sets the mirror flag of this instance.
    #[inline]
    pub fn set_flip_vert(&mut self, flip: bool) {
        self.flip_vert = flip;
    }
}

/// A circuit definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Circuit {
    name: ArcStr,
    #[serde(default)]
    impl_type: ImplType,
    /// Index into the technology property table matching the device kind.
    #[serde(default)]
    impl_idx: usize,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    nets: Vec<Net>,
    #[serde(default)]
    pins: Vec<Pin>,
    /// Nets tied to the p-substrate through device bodies.
    #[serde(default)]
    psubs: Vec<NetId>,
    /// Nets tied to n-wells through device bodies.
    #[serde(default)]
    nwells: Vec<NetId>,
    #[serde(default)]
    implemented: bool,
    /// Geometry produced for this circuit, once loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layout: Option<PathBuf>,
}

impl Circuit {
    /// Creates a new, empty circuit.
    pub fn new(name: impl Into<ArcStr>, impl_type: ImplType) -> Self {
        Self {
            name: name.into(),
            impl_type,
            impl_idx: 0,
            nodes: Vec::new(),
            nets: Vec::new(),
            pins: Vec::new(),
            psubs: Vec::new(),
            nwells: Vec::new(),
            implemented: false,
            layout: None,
        }
    }

    /// Creates a device primitive whose parameters are entry `impl_idx`
    /// of the technology table for `kind`.
    pub fn device(name: impl Into<ArcStr>, kind: DeviceKind, impl_idx: usize) -> Self {
        let mut ckt = Self::new(name, ImplType::Device(kind));
        ckt.impl_idx = impl_idx;
        ckt
    }

    /// The name of the circuit.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The implementation type of the circuit.
    #[inline]
    pub fn impl_type(&self) -> ImplType {
        self.impl_type
    }

    /// The technology table index of this circuit.
    #[inline]
    pub fn impl_idx(&self) -> usize {
        self.impl_idx
    }

    /// Returns `true` if this circuit is a device primitive.
    #[inline]
    pub fn is_device(&self) -> bool {
        self.impl_type.is_device()
    }

    /// Whether the layout of this circuit has been implemented.
    #[inline]
    pub fn is_implemented(&self) -> bool {
        self.implemented
    }

    /// Sets the implemented marker.
    #[inline]
    pub fn set_implemented(&mut self, implemented: bool) {
        self.implemented = implemented;
    }

    /// The geometry loaded for this circuit, if any.
    #[inline]
    pub fn layout(&self) -> Option<&Path> {
        self.layout.as_deref()
    }

    /// Records the geometry produced for this circuit.
    #[inline]
    pub fn set_layout(&mut self, path: impl Into<PathBuf>) {
        self.layout = Some(path.into());
    }

    /// Adds a net with the given name.
    pub fn add_net(&mut self, name: impl Into<ArcStr>) -> NetId {
        self.nets.push(Net {
            name: name.into(),
            flags: NetFlags::default(),
        });
        NetId(self.nets.len() - 1)
    }

    /// Adds an instance of `graph` with the given name.
    pub fn add_node(&mut self, name: impl Into<ArcStr>, graph: CircuitId) -> NodeId {
        self.nodes.push(Node {
            name: name.into(),
            graph,
            pins: Vec::new(),
            flip_vert: false,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Appends a pin to `node` connecting it to `net`.
    ///
    /// Pin roles are positional, so pins must be connected in the order
    /// expected by the instantiated circuit.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not exist.
    pub fn connect(&mut self, node: NodeId, net: NetId) -> PinId {
        let id = PinId(self.pins.len());
        self.pins.push(Pin { node, net });
        self.nodes[node.0].pins.push(id);
        id
    }

    /// Records `net` as a p-substrate body connection.
    #[inline]
    pub fn add_psub(&mut self, net: NetId) {
        self.psubs.push(net);
    }

    /// Records `net` as an n-well body connection.
    #[inline]
    pub fn add_nwell(&mut self, net: NetId) {
        self.nwells.push(net);
    }

    /// The number of instances in this circuit.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Gets the instance with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no instance has the given ID.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Gets a mutable reference to the instance with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no instance has the given ID.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Iterates over the `(id, instance)` pairs of this circuit in index order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// The number of nets in this circuit.
    #[inline]
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Gets the net with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no net has the given ID.
    #[inline]
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }

    /// Gets the net with the given ID, if it exists.
    #[inline]
    pub fn try_net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.0)
    }

    /// Iterates over the `(id, net)` pairs of this circuit in index order.
    pub fn nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets.iter().enumerate().map(|(i, n)| (NetId(i), n))
    }

    /// Gets the pin with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no pin has the given ID.
    #[inline]
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.0]
    }

    /// Gets the pin with the given ID, if it exists.
    #[inline]
    pub fn try_pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(id.0)
    }

    /// The nets connected to `node`, in pin order.
    pub fn node_nets(&self, node: NodeId) -> impl Iterator<Item = NetId> + '_ {
        self.node(node).pins.iter().map(|&p| self.pin(p).net)
    }

    /// The p-substrate body nets of this circuit.
    #[inline]
    pub fn psubs(&self) -> &[NetId] {
        &self.psubs
    }

    /// The n-well body nets of this circuit.
    #[inline]
    pub fn nwells(&self) -> &[NetId] {
        &self.nwells
    }
}

/// Serialized form of a [`Design`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DesignData {
    #[serde(default)]
    circuits: Vec<Circuit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<CircuitId>,
    #[serde(default)]
    phy: PhyPropDb,
}

/// An arena of circuit definitions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "DesignData", into = "DesignData")]
pub struct Design {
    circuits: Vec<Circuit>,
    /// Map from circuit name to ID.
    ///
    /// The first circuit registered under a name wins.
    name_map: HashMap<ArcStr, CircuitId>,
    root: Option<CircuitId>,
    phy: PhyPropDb,
}

impl From<DesignData> for Design {
    fn from(value: DesignData) -> Self {
        let mut design = Design {
            phy: value.phy,
            ..Default::default()
        };
        for circuit in value.circuits {
            design.add_circuit(circuit);
        }
        design.root = value.root;
        design
    }
}

impl From<Design> for DesignData {
    fn from(value: Design) -> Self {
        DesignData {
            circuits: value.circuits,
            root: value.root,
            phy: value.phy,
        }
    }
}

impl Design {
    /// Creates a new, empty design.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the given circuit to the design, returning its ID.
    pub fn add_circuit(&mut self, circuit: Circuit) -> CircuitId {
        let id = CircuitId(self.circuits.len());
        self.name_map.entry(circuit.name.clone()).or_insert(id);
        self.circuits.push(circuit);
        id
    }

    /// The number of circuits in the design.
    #[inline]
    pub fn num_circuits(&self) -> usize {
        self.circuits.len()
    }

    /// Gets the circuit with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no circuit has the given ID.
    /// For a non-panicking alternative, see [`try_circuit`](Design::try_circuit).
    #[inline]
    pub fn circuit(&self, id: CircuitId) -> &Circuit {
        &self.circuits[id.0]
    }

    /// Gets the circuit with the given ID, if it exists.
    #[inline]
    pub fn try_circuit(&self, id: CircuitId) -> Option<&Circuit> {
        self.circuits.get(id.0)
    }

    /// Gets a mutable reference to the circuit with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no circuit has the given ID.
    #[inline]
    pub fn circuit_mut(&mut self, id: CircuitId) -> &mut Circuit {
        &mut self.circuits[id.0]
    }

    /// Gets the ID of the circuit with the given name.
    #[inline]
    pub fn circuit_id_named(&self, name: &str) -> Option<CircuitId> {
        self.name_map.get(name).copied()
    }

    /// Iterates over the `(id, circuit)` pairs of this design in index order.
    pub fn circuits(&self) -> impl Iterator<Item = (CircuitId, &Circuit)> {
        self.circuits
            .iter()
            .enumerate()
            .map(|(i, c)| (CircuitId(i), c))
    }

    /// Returns `true` if `node` of circuit `parent` instantiates a device primitive.
    ///
    /// # Panics
    ///
    /// Panics if the parent, the instance or the instantiated circuit does not exist.
    pub fn is_leaf(&self, parent: CircuitId, node: NodeId) -> bool {
        let child = self.circuit(parent).node(node).graph;
        self.circuit(child).is_device()
    }

    /// Looks up the physical parameters of a device primitive.
    pub fn device_params(&self, id: CircuitId) -> Result<DeviceParams> {
        let circuit = self.circuit(id);
        let kind = circuit
            .impl_type
            .device_kind()
            .ok_or_else(|| Error::NotADevice(circuit.name.clone()))?;
        self.phy.params(kind, circuit.impl_idx)
    }

    /// The technology property database.
    #[inline]
    pub fn phy(&self) -> &PhyPropDb {
        &self.phy
    }

    /// A mutable reference to the technology property database.
    #[inline]
    pub fn phy_mut(&mut self) -> &mut PhyPropDb {
        &mut self.phy
    }

    /// Replaces the technology property database.
    #[inline]
    pub fn set_phy(&mut self, phy: PhyPropDb) {
        self.phy = phy;
    }

    /// The root circuit of the hierarchy, if one has been set or found.
    #[inline]
    pub fn root(&self) -> Option<CircuitId> {
        self.root
    }

    /// Sets the root circuit of the hierarchy.
    #[inline]
    pub fn set_root(&mut self, root: CircuitId) {
        self.root = Some(root);
    }

    /// Finds and records the root circuit of the hierarchy.
    ///
    /// Runs a depth-first search from every circuit not yet visited, in index
    /// order, descending only into composite children. The root is the start
    /// of the last search, i.e. a circuit not instantiated by any circuit
    /// explored before it. Device primitives never start a search.
    pub fn find_root(&mut self) -> Option<CircuitId> {
        let n = self.circuits.len();
        let mut visited = vec![false; n];
        let mut root = None;

        for start in 0..n {
            if visited[start] || self.circuits[start].is_device() {
                continue;
            }
            let mut stack = vec![start];
            while let Some(idx) = stack.pop() {
                visited[idx] = true;
                for node in self.circuits[idx].nodes.iter() {
                    let child = node.graph.0;
                    if child >= n || visited[child] || self.circuits[child].is_device() {
                        continue;
                    }
                    stack.push(child);
                }
            }
            root = Some(CircuitId(start));
        }

        if let Some(root) = root {
            tracing::debug!(root = %self.circuits[root.0].name, "found root circuit");
        }
        self.root = root;
        root
    }
}
