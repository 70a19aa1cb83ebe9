//! Script plugin for the layout flow.
//!
//! [`ScriptTool`] implements every flow strategy, and system symmetry
//! detection, by running external tools. The command for each [`Stage`] is a
//! `tera` template taken from [`Params::tools`]. It is rendered with the
//! stage, cell, output directory, flip flag and flow parameters, wrapped in a
//! bash run script and executed. A stage without a configured command does
//! nothing.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use cktdb::{CircuitId, Design};
use constgen::{SymRecord, SystemSymmetry};
use flow::params::Params;
use flow::strategy::{
    DeviceGenerator, Placement, PlacementHandle, Placer, Router, StdCellGenerator,
};
use lazy_static::lazy_static;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::utils::{execute_run_script, write_run_script, OutputFiles};

pub mod error;
pub mod utils;


pub const TEMPLATES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        match Tera::new(&format!("{TEMPLATES_PATH}/*")) {
            Ok(t) => t,
            Err(e) => {
                panic!("Encountered errors while parsing Tera templates: {e}");
            }
        }
    };
}

/// The extension of system symmetry results written by the `system_sym` stage.
pub const SYSTEM_SYM_EXTENSION: &str = "sym.sys";

/// A flow stage run through an external tool.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Device layout generation.
    Device,
    /// Loading generated device layouts.
    ReadGds,
    /// Standard cell setup.
    StdCell,
    /// Placement.
    Place,
    /// Routing.
    Route,
    /// System symmetry detection.
    SystemSym,
}

impl Stage {
    /// The key of the stage's command template in [`Params::tools`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::ReadGds => "read_gds",
            Self::StdCell => "std_cell",
            Self::Place => "place",
            Self::Route => "route",
            Self::SystemSym => "system_sym",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Serialize)]
struct StageContext<'a> {
    stage: Stage,
    cell: &'a str,
    out_dir: &'a Path,
    work_dir: &'a Path,
    flip: bool,
    params: &'a Params,
}

/// Runs flow stages through command templates.
#[derive(Clone, Debug)]
pub struct ScriptTool {
    params: Arc<Params>,
    work_dir: PathBuf,
}

impl ScriptTool {
    /// Creates a tool writing run scripts to `<result_dir>/scripts`.
    pub fn new(params: Params) -> Self {
        let work_dir = params.result_dir.join("scripts");
        Self {
            params: Arc::new(params),
            work_dir,
        }
    }

    /// Sets the directory run scripts and their output are written to.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// The directory run scripts and their output are written to.
    #[inline]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns `true` if a command is configured for `stage`.
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.params.tool(stage.as_str()).is_some()
    }

    /// The path of the run script of `stage` for `cell`.
    pub fn run_script_path(&self, stage: Stage, cell: &str) -> PathBuf {
        self.work_dir.join(format!("{cell}.{stage}.sh"))
    }

    /// Runs `stage` for `cell`.
    ///
    /// Returns [`None`] without running anything if no command is configured for the stage.
    pub fn run_stage(
        &self,
        stage: Stage,
        cell: &str,
        out_dir: &Path,
        flip: bool,
    ) -> Result<Option<OutputFiles>> {
        let Some(template) = self.params.tool(stage.as_str()) else {
            tracing::debug!(%stage, cell, "no command configured, skipping");
            return Ok(None);
        };

        fs::create_dir_all(&self.work_dir)?;
        fs::create_dir_all(out_dir)?;

        let mut context = Context::from_serialize(StageContext {
            stage,
            cell,
            out_dir,
            work_dir: &self.work_dir,
            flip,
            params: &self.params,
        })?;
        let command = Tera::one_off(template, &context, false)?;
        context.insert("command", &command);

        let run_script_path = self.run_script_path(stage, cell);
        let contents = TEMPLATES.render("run_stage.sh", &context)?;
        write_run_script(&run_script_path, &contents)?;

        tracing::info!(%stage, cell, script = ?run_script_path, "running");
        let output =
            execute_run_script(&run_script_path, &self.work_dir, &format!("{cell}.{stage}"))?;
        Ok(Some(output))
    }

    fn load_layout(&self, design: &mut Design, id: CircuitId, out_dir: &Path) -> Option<PathBuf> {
        let circuit = design.circuit_mut(id);
        let path = out_dir.join(format!("{}.gds", circuit.name()));
        if !path.is_file() {
            return None;
        }
        circuit.set_layout(path.clone());
        Some(path)
    }
}

/// Parses the records of a system symmetry result.
///
/// A line with two or more tokens pairs its first two tokens. A line with one
/// token names a self-symmetric instance. Empty lines are skipped.
pub fn parse_sym_records(text: &str) -> Vec<SymRecord> {
    text.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let inst = tokens.next()?;
            Some(match tokens.next() {
                Some(mirror) => SymRecord::pair(inst, mirror),
                None => SymRecord::single(inst),
            })
        })
        .collect()
}

impl DeviceGenerator for ScriptTool {
    fn generate(
        &self,
        design: &Design,
        id: CircuitId,
        out_dir: &Path,
        flip: bool,
    ) -> anyhow::Result<()> {
        self.run_stage(Stage::Device, design.circuit(id).name(), out_dir, flip)?;
        Ok(())
    }

    fn read_gds(&self, design: &mut Design, id: CircuitId, out_dir: &Path) -> anyhow::Result<()> {
        let cell = design.circuit(id).name().clone();
        self.run_stage(Stage::ReadGds, &cell, out_dir, false)?;
        if self.load_layout(design, id, out_dir).is_none() && self.has_stage(Stage::Device) {
            return Err(Error::MissingLayout(out_dir.join(format!("{cell}.gds"))).into());
        }
        Ok(())
    }
}

impl StdCellGenerator for ScriptTool {
    fn setup(&self, design: &mut Design, id: CircuitId, out_dir: &Path) -> anyhow::Result<()> {
        let cell = design.circuit(id).name().clone();
        self.run_stage(Stage::StdCell, &cell, out_dir, false)?;
        self.load_layout(design, id, out_dir);
        Ok(())
    }
}

impl Placer for ScriptTool {
    fn place_only(
        &self,
        design: &Design,
        id: CircuitId,
        out_dir: &Path,
    ) -> anyhow::Result<Placement> {
        let start = Instant::now();
        self.run_stage(Stage::Place, design.circuit(id).name(), out_dir, false)?;
        Ok(Placement {
            handle: PlacementHandle::new(design, id, out_dir),
            runtime: start.elapsed(),
        })
    }
}

impl Router for ScriptTool {
    fn route_only(&self, handle: &PlacementHandle) -> anyhow::Result<()> {
        self.run_stage(Stage::Route, &handle.cell, &handle.out_dir, false)?;
        Ok(())
    }
}

impl SystemSymmetry for ScriptTool {
    fn system_sym(
        &self,
        design: &Design,
        circuit: CircuitId,
        out_dir: &Path,
    ) -> anyhow::Result<Vec<SymRecord>> {
        let cell = design.circuit(circuit).name();
        if self.run_stage(Stage::SystemSym, cell, out_dir, false)?.is_none() {
            return Ok(Vec::new());
        }
        let path = out_dir.join(format!("{cell}.{SYSTEM_SYM_EXTENSION}"));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read system symmetry result {path:?}"))?;
        Ok(parse_sym_records(&text))
    }
}
