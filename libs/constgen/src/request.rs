//! Constraint generation requests.
//!
//! A [`ConstGen`] accumulates the nets, device instances and pin roles of a
//! primary cell. It is the input handed to a [`PrimarySolver`](crate::solver::PrimarySolver).

use std::fmt::Display;

use arcstr::ArcStr;
use cktdb::{DeviceKind, DeviceParams, NetId};
use serde::{Deserialize, Serialize};

/// The role of a device pin, determined by its position.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum PinType {
    /// Transistor drain.
    D,
    /// Transistor gate.
    G,
    /// Transistor source.
    S,
    /// Transistor body.
    B,
    /// First passive terminal.
    This,
    /// Second passive terminal.
    That,
    /// Third (substrate) passive terminal.
    Other,
}

impl Display for PinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::D => write!(f, "D"),
            Self::G => write!(f, "G"),
            Self::S => write!(f, "S"),
            Self::B => write!(f, "B"),
            Self::This => write!(f, "THIS"),
            Self::That => write!(f, "THAT"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Pin roles of transistors, by position.
pub const MOS_PIN_TYPES: [PinType; 4] = [PinType::D, PinType::G, PinType::S, PinType::B];

/// Pin roles of resistors and capacitors, by position.
pub const PASSIVE_PIN_TYPES: [PinType; 3] = [PinType::This, PinType::That, PinType::Other];

/// Returns the positional pin role table for the given device kind.
pub fn pin_types(kind: DeviceKind) -> &'static [PinType] {
    match kind {
        DeviceKind::Nmos | DeviceKind::Pmos => &MOS_PIN_TYPES,
        DeviceKind::Resistor | DeviceKind::Capacitor => &PASSIVE_PIN_TYPES,
    }
}

/// A pin constraint tying an instance pin to a net.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InstPin {
    /// The net the pin connects to.
    pub net: NetId,
    /// The role of the pin.
    pub pin_type: PinType,
}

/// A device instance registered with a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstDesc {
    /// The instance name.
    pub name: ArcStr,
    /// The physical parameters of the instantiated device.
    pub params: DeviceParams,
    /// The pin constraints of this instance.
    pub pins: Vec<InstPin>,
}

impl InstDesc {
    /// The net connected to the pin with the given role, if any.
    pub fn net(&self, pin_type: PinType) -> Option<NetId> {
        self.pins
            .iter()
            .find(|p| p.pin_type == pin_type)
            .map(|p| p.net)
    }
}

/// A registered net.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetDesc {
    /// The net name.
    pub name: ArcStr,
    /// The index of the net in its circuit.
    pub idx: NetId,
}

/// A constraint generation request for one primary cell.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConstGen {
    nets: Vec<NetDesc>,
    insts: Vec<InstDesc>,
}

impl ConstGen {
    /// Creates a new, empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a net, returning its handle.
    pub fn add_net(&mut self, name: impl Into<ArcStr>, idx: NetId) -> usize {
        self.nets.push(NetDesc {
            name: name.into(),
            idx,
        });
        self.nets.len() - 1
    }

    /// Registers a device instance, returning its handle.
    pub fn add_inst(&mut self, name: impl Into<ArcStr>, params: DeviceParams) -> usize {
        self.insts.push(InstDesc {
            name: name.into(),
            params,
            pins: Vec::new(),
        });
        self.insts.len() - 1
    }

    /// Registers a pin constraint on the instance with handle `inst`.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is not a handle returned by [`ConstGen::add_inst`].
    pub fn add_inst_pin(&mut self, inst: usize, net: NetId, pin_type: PinType) {
        self.insts[inst].pins.push(InstPin { net, pin_type });
    }

    /// The registered nets, in registration order.
    #[inline]
    pub fn nets(&self) -> &[NetDesc] {
        &self.nets
    }

    /// The registered instances, in registration order.
    #[inline]
    pub fn insts(&self) -> &[InstDesc] {
        &self.insts
    }
}
