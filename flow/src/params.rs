//! Flow parameters.
//!
//! Parameters are read from a TOML document. Every field has a default, so an
//! empty document is valid apart from the missing netlist.

use std::fs;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A piecewise table entry `[threshold, value]`.
pub type Step = [f64; 2];

/// A via cut rule `[length, cuts, rows, cols]`.
///
/// Applies to wires at least `length` microns long.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViaCutRule(pub f64, pub u32, pub u32, pub u32);

/// Wire widths by net class, in microns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireWidths {
    /// Analog signal nets.
    pub analog: Vec<Step>,
    /// Digital signal nets.
    pub digital: Vec<Step>,
    /// Analog supply nets.
    pub power: Vec<Step>,
    /// Digital supply nets.
    pub dpower: Vec<Step>,
}

impl Default for WireWidths {
    fn default() -> Self {
        Self {
            analog: vec![[0.0, 0.1], [120.0, 0.2]],
            digital: vec![[0.0, 0.1], [100.0, 0.12]],
            power: vec![[0.0, 0.5]],
            dpower: vec![[0.0, 0.3]],
        }
    }
}

/// Via cut rules by net class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViaCuts {
    /// Analog signal nets.
    pub analog: Vec<ViaCutRule>,
    /// Digital signal nets.
    pub digital: Vec<ViaCutRule>,
    /// Supply nets.
    pub power: Vec<ViaCutRule>,
}

impl Default for ViaCuts {
    fn default() -> Self {
        Self {
            analog: vec![
                ViaCutRule(0.0, 2, 1, 2),
                ViaCutRule(80.0, 4, 2, 2),
                ViaCutRule(120.0, 9, 3, 3),
            ],
            digital: vec![ViaCutRule(0.0, 2, 1, 2), ViaCutRule(120.0, 4, 2, 2)],
            power: vec![ViaCutRule(0.0, 4, 2, 2), ViaCutRule(100.0, 9, 3, 3)],
        }
    }
}

/// Spacing between placed blocks, by block size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSpacing {
    /// Horizontal spacing.
    pub x: Vec<Step>,
    /// Vertical spacing.
    pub y: Vec<Step>,
}

impl Default for BlockSpacing {
    fn default() -> Self {
        Self {
            x: vec![[0.0, 0.2], [100.0, 0.8]],
            y: vec![[0.0, 0.2], [100.0, 0.4]],
        }
    }
}

fn names(names: &[&'static str]) -> Vec<ArcStr> {
    names.iter().map(|&n| ArcStr::from(n)).collect()
}

/// Parameters of a flow run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// The circuit graph document.
    ///
    /// Relative paths are resolved against [`Params::result_dir`].
    pub netlist: Option<PathBuf>,
    /// The technology property document.
    ///
    /// Relative paths are resolved against [`Params::result_dir`].
    pub tech_file: Option<PathBuf>,
    /// The directory all results are written to.
    pub result_dir: PathBuf,
    /// Names of nets tied to the positive supply.
    pub vdd_net_names: Vec<ArcStr>,
    /// Names of nets tied to ground.
    pub vss_net_names: Vec<ArcStr>,
    /// Names of digital nets.
    pub digital_net_names: Vec<ArcStr>,
    /// Names of circuits implemented as standard cells.
    pub std_cells: Vec<ArcStr>,
    /// The metal layer used for power routing.
    pub power_layer: u32,
    /// The layer used for substrate contacts.
    ///
    /// Defaults to [`Params::power_layer`].
    pub psub_layer: Option<u32>,
    /// Modules smaller than this area are placed without a guard ring.
    pub small_module_area_threshold: f64,
    /// Wire width tables.
    pub wire_width: WireWidths,
    /// Via cut tables.
    pub via_cuts: ViaCuts,
    /// Block spacing tables.
    pub block_spacing: BlockSpacing,
    /// Command templates of external tools, keyed by flow stage.
    pub tools: IndexMap<String, String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            netlist: None,
            tech_file: None,
            result_dir: PathBuf::from("."),
            vdd_net_names: names(&["VDD", "vdd", "vdda", "vddd"]),
            vss_net_names: names(&["VSS", "GND", "vss", "gnd", "vssa", "vssd"]),
            digital_net_names: names(&["clk"]),
            std_cells: names(&[
                "SR_Latch_LVT",
                "NR2D8BWP_LVT",
                "BUFFD4BWP_LVT",
                "DFCND4BWP_LVT",
                "INVD4BWP_LVT",
                "DFCNQD2BWP_LVT",
                "DFCND4BWP_LVT_stupid",
            ]),
            power_layer: 6,
            psub_layer: None,
            small_module_area_threshold: 60.0,
            wire_width: WireWidths::default(),
            via_cuts: ViaCuts::default(),
            block_spacing: BlockSpacing::default(),
            tools: IndexMap::new(),
        }
    }
}

impl Params {
    /// Reads parameters from the TOML document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves a path relative to the result directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.result_dir.join(path)
    }

    /// The directory generated device geometry is written to.
    pub fn gds_dir(&self) -> PathBuf {
        self.result_dir.join("gds")
    }

    /// The layer used for substrate contacts.
    pub fn psub_layer(&self) -> u32 {
        self.psub_layer.unwrap_or(self.power_layer)
    }

    /// Returns `true` if circuits named `name` are implemented as standard cells.
    pub fn is_std_cell(&self, name: &str) -> bool {
        self.std_cells.iter().any(|cell| cell.as_str() == name)
    }

    /// The command template configured for `stage`, if any.
    pub fn tool(&self, stage: &str) -> Option<&str> {
        self.tools.get(stage).map(String::as_str)
    }
}
