use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use constgen::init_obj::write_init_obj;
use constgen::{is_primary, ConstraintGenerator};
use flow::db::FlowDb;
use flow::params::Params;
use flow::strategy::Strategies;
use flow::Flow;
use script::ScriptTool;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Constraints(args) => constraints(args),
        Command::Check(args) => check(args),
    }
}

/// Hierarchical analog layout flow.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Implement and route the whole hierarchy.
    Run(FlowArgs),
    /// Generate symmetry constraints for every composite circuit.
    Constraints(ConstraintArgs),
    /// Load and validate the design without running any tools.
    Check(FlowArgs),
}

#[derive(Args)]
struct FlowArgs {
    /// The path to the flow configuration.
    config: PathBuf,
    /// Overrides the result directory of the configuration.
    #[arg(short, long)]
    result_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ConstraintArgs {
    #[command(flatten)]
    flow: FlowArgs,
    /// Also export `.initObj` device lists of primary cells to this directory.
    #[arg(long)]
    init_obj: Option<PathBuf>,
}

impl FlowArgs {
    fn load(&self) -> anyhow::Result<FlowDb> {
        let mut params = Params::load(&self.config)
            .with_context(|| format!("Failed to load configuration {:?}.", self.config))?;
        if let Some(result_dir) = &self.result_dir {
            params.result_dir = result_dir.clone();
        }
        FlowDb::load(params).with_context(|| "Failed to load design.")
    }
}

fn flow(params: Params) -> Flow {
    let tool = ScriptTool::new(params.clone());
    let constraints = ConstraintGenerator::new(params.result_dir.clone()).with_system(tool.clone());
    Flow::new(params, Strategies::uniform(tool)).with_constraints(constraints)
}

fn run(args: FlowArgs) -> anyhow::Result<()> {
    let FlowDb { params, mut design } = args.load()?;
    let report = flow(params)
        .run(&mut design)
        .with_context(|| "Layout flow failed.")?;
    for (cell, dispatch) in &report.implemented {
        tracing::info!(%cell, %dispatch, "implemented");
    }
    tracing::info!(
        circuits = report.implemented.len(),
        devices = report.device_instances,
        routed = report.routed,
        runtime = ?report.hierarchy_time,
        placement_runtime = ?report.placement_runtime,
        "flow complete"
    );
    Ok(())
}

fn constraints(args: ConstraintArgs) -> anyhow::Result<()> {
    let FlowDb { params, design } = args.flow.load()?;
    let mut flow = flow(params);
    let maps = flow
        .generate_constraints(&design)
        .with_context(|| "Constraint generation failed.")?;
    for (id, map) in &maps {
        tracing::info!(cell = %design.circuit(*id).name(), pairs = map.len(), "constraints ready");
    }
    if let Some(dir) = &args.init_obj {
        for (id, _) in &maps {
            if !is_primary(&design, *id) {
                continue;
            }
            let path = write_init_obj(&design, *id, dir)
                .with_context(|| format!("Failed to export {:?}.", design.circuit(*id).name()))?;
            tracing::info!(path = ?path, "wrote device list");
        }
    }
    tracing::info!(
        circuits = maps.len(),
        written = flow.constraints().artifacts_written(),
        "constraint generation complete"
    );
    Ok(())
}

fn check(args: FlowArgs) -> anyhow::Result<()> {
    let FlowDb { design, .. } = args.load()?;
    let root = design.root().map(|root| design.circuit(root).name().clone());
    tracing::info!(
        circuits = design.num_circuits(),
        root = ?root,
        "design is valid"
    );
    Ok(())
}
