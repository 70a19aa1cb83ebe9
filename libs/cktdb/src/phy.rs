//! Technology property database.
//!
//! Physical parameters of device primitives, addressed by device kind
//! and implementation index. Dimensions are in metres.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::DeviceKind;

/// Physical properties of a transistor.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MosProp {
    /// Gate width.
    pub width: f64,
    /// Gate length.
    pub length: f64,
    /// Number of fingers.
    pub num_fingers: u32,
}

/// Physical properties of a resistor.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResProp {
    /// Width of a segment.
    pub width: f64,
    /// Length of a segment.
    pub length: f64,
    /// Number of series segments.
    pub seg_num: u32,
}

/// Physical properties of a capacitor.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapProp {
    /// Finger width.
    pub width: f64,
    /// Finger length.
    pub length: f64,
    /// Number of fingers.
    pub num_fingers: u32,
}

/// The kind-independent view of a device's physical parameters.
///
/// `count` is the finger count for transistors and capacitors
/// and the segment count for resistors.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceParams {
    /// The device kind.
    pub kind: DeviceKind,
    /// Width in metres.
    pub width: f64,
    /// Length in metres.
    pub length: f64,
    /// Finger or segment count.
    pub count: u32,
}

/// Per-kind tables of device properties.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyPropDb {
    nch: Vec<MosProp>,
    pch: Vec<MosProp>,
    resistors: Vec<ResProp>,
    capacitors: Vec<CapProp>,
}

impl PhyPropDb {
    /// Creates a new, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an n-channel transistor entry, returning its index.
    pub fn add_nch(&mut self, prop: MosProp) -> usize {
        self.nch.push(prop);
        self.nch.len() - 1
    }

    /// Adds a p-channel transistor entry, returning its index.
    pub fn add_pch(&mut self, prop: MosProp) -> usize {
        self.pch.push(prop);
        self.pch.len() - 1
    }

    /// Adds a resistor entry, returning its index.
    pub fn add_resistor(&mut self, prop: ResProp) -> usize {
        self.resistors.push(prop);
        self.resistors.len() - 1
    }

    /// Adds a capacitor entry, returning its index.
    pub fn add_capacitor(&mut self, prop: CapProp) -> usize {
        self.capacitors.push(prop);
        self.capacitors.len() - 1
    }

    /// Looks up the parameters of entry `idx` of the table for `kind`.
    pub fn params(&self, kind: DeviceKind, idx: usize) -> Result<DeviceParams> {
        let missing = || Error::MissingTechEntry { kind, idx };
        let (width, length, count) = match kind {
            DeviceKind::Nmos => {
                let p = self.nch.get(idx).ok_or_else(missing)?;
                (p.width, p.length, p.num_fingers)
            }
            DeviceKind::Pmos => {
                let p = self.pch.get(idx).ok_or_else(missing)?;
                (p.width, p.length, p.num_fingers)
            }
            DeviceKind::Resistor => {
                let p = self.resistors.get(idx).ok_or_else(missing)?;
                (p.width, p.length, p.seg_num)
            }
            DeviceKind::Capacitor => {
                let p = self.capacitors.get(idx).ok_or_else(missing)?;
                (p.width, p.length, p.num_fingers)
            }
        };
        Ok(DeviceParams {
            kind,
            width,
            length,
            count,
        })
    }
}
