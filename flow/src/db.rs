//! Loading the flow database.

use std::fs;
use std::path::Path;

use cktdb::{Design, PhyPropDb};
use serde::de::DeserializeOwned;
use tracing::Level;

use crate::error::{Error, Result};
use crate::params::Params;

/// A validated, post-processed design together with the parameters it was loaded with.
#[derive(Clone, Debug)]
pub struct FlowDb {
    /// The flow parameters.
    pub params: Params,
    /// The circuit graph.
    pub design: Design,
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl FlowDb {
    /// Loads the design described by `params`.
    ///
    /// Reads the circuit graph and, if configured, the technology property
    /// database, then validates the graph, finds its root and classifies its
    /// nets. Fails if no netlist is configured or the graph has errors.
    pub fn load(params: Params) -> Result<Self> {
        let _guard = tracing::span!(Level::INFO, "load").entered();
        let netlist = params.netlist.as_ref().ok_or(Error::MissingNetlist)?;

        let path = params.resolve(netlist);
        tracing::info!(path = ?path, "reading circuit graph");
        let mut design: Design = read_toml(&path)?;

        if let Some(tech_file) = &params.tech_file {
            let path = params.resolve(tech_file);
            tracing::info!(path = ?path, "reading technology properties");
            let phy: PhyPropDb = read_toml(&path)?;
            design.set_phy(phy);
        }

        let issues = design.validate();
        if issues.has_error() {
            tracing::error!(
                errors = issues.num_errors(),
                warnings = issues.num_warnings(),
                "circuit graph failed validation"
            );
            return Err(Error::InvalidDesign {
                num_errors: issues.num_errors(),
            });
        }

        let root = match design.root() {
            Some(root) if design.try_circuit(root).is_some() => root,
            _ => design.find_root().ok_or(Error::NoRoot)?,
        };
        tracing::info!(
            root = %design.circuit(root).name(),
            circuits = design.num_circuits(),
            "loaded circuit graph"
        );

        design.mark_power_nets(&params.vdd_net_names, &params.vss_net_names);
        design.mark_digital_nets(&params.digital_net_names);

        Ok(Self { params, design })
    }
}
