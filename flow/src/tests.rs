use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use approx::assert_relative_eq;
use arcstr::ArcStr;
use cktdb::{Circuit, CircuitId, Design, DeviceKind, ImplType, MosProp, NodeId};
use test_log::test;

use crate::db::FlowDb;
use crate::error::Error;
use crate::params::{Params, ViaCutRule};
use crate::strategy::*;
use crate::*;

const BUILD_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

fn test_dir(test_name: &str) -> PathBuf {
    let dir = PathBuf::from(BUILD_DIR).join(test_name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Event {
    Device { cell: ArcStr, flip: bool },
    ReadGds(ArcStr),
    StdCell(ArcStr),
    Place(ArcStr),
    Route(ArcStr),
}

/// A tool that records every strategy invocation.
#[derive(Clone, Default)]
struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
    fail_place: Option<&'static str>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl DeviceGenerator for Recorder {
    fn generate(
        &self,
        design: &Design,
        id: CircuitId,
        out_dir: &Path,
        flip: bool,
    ) -> anyhow::Result<()> {
        assert!(out_dir.ends_with("gds"));
        self.push(Event::Device {
            cell: design.circuit(id).name().clone(),
            flip,
        });
        Ok(())
    }

    fn read_gds(&self, design: &mut Design, id: CircuitId, _out_dir: &Path) -> anyhow::Result<()> {
        self.push(Event::ReadGds(design.circuit(id).name().clone()));
        Ok(())
    }
}

impl StdCellGenerator for Recorder {
    fn setup(&self, design: &mut Design, id: CircuitId, _out_dir: &Path) -> anyhow::Result<()> {
        self.push(Event::StdCell(design.circuit(id).name().clone()));
        Ok(())
    }
}

impl Placer for Recorder {
    fn place_only(
        &self,
        design: &Design,
        id: CircuitId,
        out_dir: &Path,
    ) -> anyhow::Result<Placement> {
        let cell = design.circuit(id).name().clone();
        if self.fail_place == Some(cell.as_str()) {
            anyhow::bail!("placer crashed");
        }
        self.push(Event::Place(cell));
        Ok(Placement {
            handle: PlacementHandle::new(design, id, out_dir),
            runtime: Duration::from_millis(5),
        })
    }
}

impl Router for Recorder {
    fn route_only(&self, handle: &PlacementHandle) -> anyhow::Result<()> {
        self.push(Event::Route(handle.cell.clone()));
        Ok(())
    }
}

fn params(dir: &Path) -> Params {
    Params {
        result_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn device(cell: &str, flip: bool) -> Event {
    Event::Device {
        cell: cell.into(),
        flip,
    }
}

/// `top` instantiates the matched pair `amp` twice and one standard cell.
fn amp_design() -> (Design, CircuitId, CircuitId) {
    let mut design = Design::new();
    let nch = design.phy_mut().add_nch(MosProp {
        width: 1e-6,
        length: 1e-7,
        num_fingers: 2,
    });
    let nmos = design.add_circuit(Circuit::device("nch", DeviceKind::Nmos, nch));

    let mut amp = Circuit::new("amp", ImplType::Unset);
    let inp = amp.add_net("inp");
    let inn = amp.add_net("inn");
    let tail = amp.add_net("tail");
    let vss = amp.add_net("vss");
    for (name, drain, gate) in [("M1", inn, inp), ("M2", inp, inn)] {
        let m = amp.add_node(name, nmos);
        amp.connect(m, drain);
        amp.connect(m, gate);
        amp.connect(m, tail);
        amp.connect(m, vss);
    }
    amp.add_psub(vss);
    let amp = design.add_circuit(amp);

    let inv = design.add_circuit(Circuit::new("INVD4BWP_LVT", ImplType::Unset));

    let mut top = Circuit::new("top", ImplType::Unset);
    let out = top.add_net("out");
    let clk = top.add_net("clk");
    let vdd = top.add_net("VDD");
    for name in ["X1", "X2"] {
        let x = top.add_node(name, amp);
        top.connect(x, out);
    }
    let s = top.add_node("S1", inv);
    top.connect(s, clk);
    top.connect(s, vdd);
    let top = design.add_circuit(top);

    (design, amp, top)
}

#[test]
fn implements_each_definition_once_bottom_up() {
    let dir = test_dir("implements_each_definition_once_bottom_up");
    let (mut design, amp, top) = amp_design();
    let tool = Recorder::default();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    let report = flow.run(&mut design).unwrap();

    assert_eq!(
        tool.events(),
        vec![
            device("nch", false),
            Event::ReadGds("nch".into()),
            device("nch", true),
            Event::ReadGds("nch".into()),
            Event::Place("amp".into()),
            Event::StdCell("INVD4BWP_LVT".into()),
            Event::Place("top".into()),
            Event::Route("amp".into()),
            Event::Route("top".into()),
        ]
    );

    let implemented: Vec<_> = report
        .implemented
        .iter()
        .map(|(name, dispatch)| (name.as_str(), *dispatch))
        .collect();
    assert_eq!(
        implemented,
        vec![
            ("amp", Dispatch::Placement),
            ("INVD4BWP_LVT", Dispatch::StdCell),
            ("top", Dispatch::Placement),
        ]
    );
    assert_eq!(report.count(Dispatch::Placement), 2);
    assert_eq!(report.count(Dispatch::Device), 0);
    assert_eq!(report.device_instances, 2);
    assert_eq!(report.routed, 2);
    assert_relative_eq!(report.placement_runtime.as_secs_f64(), 0.010);
    assert!(design.circuit(amp).is_implemented());
    assert!(design.circuit(top).is_implemented());
    assert_eq!(flow.constraints().artifacts_written(), 2);
}

#[test]
fn mirrors_counterparts_in_symmetry_map() {
    let dir = test_dir("mirrors_counterparts_in_symmetry_map");
    fs::write(dir.join("top.sym"), "X2 X1\n").unwrap();
    let (mut design, _, top) = amp_design();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(Recorder::default()));
    flow.run(&mut design).unwrap();

    let top = design.circuit(top);
    assert!(top.node(NodeId(0)).flip_vert());
    assert!(!top.node(NodeId(1)).flip_vert());
    assert!(!top.node(NodeId(2)).flip_vert());
}

#[test]
fn mirror_ignores_declaration_order() {
    let dir = test_dir("mirror_ignores_declaration_order");
    fs::write(dir.join("amp.sym"), "M2 M1\n").unwrap();
    let (mut design, amp, _) = amp_design();
    let tool = Recorder::default();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    flow.implement(&mut design, amp).unwrap();

    assert_eq!(
        tool.events(),
        vec![
            device("nch", true),
            Event::ReadGds("nch".into()),
            device("nch", false),
            Event::ReadGds("nch".into()),
            Event::Place("amp".into()),
        ]
    );
}

#[test]
fn setup_uses_given_map() {
    let dir = test_dir("setup_uses_given_map");
    let (mut design, _, top) = amp_design();
    let mut sym = constgen::SymmetryMap::new();
    sym.insert("X1", "X2");

    let mut flow = Flow::new(params(&dir), Strategies::uniform(Recorder::default()));
    flow.setup(&mut design, top, sym).unwrap();

    let top = design.circuit(top);
    assert!(!top.node(NodeId(0)).flip_vert());
    assert!(top.node(NodeId(1)).flip_vert());
}

#[test]
fn empty_composite_is_placed() {
    let dir = test_dir("empty_composite_is_placed");
    let mut design = Design::new();
    let empty = design.add_circuit(Circuit::new("empty", ImplType::Composite));
    let tool = Recorder::default();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    let report = flow.run(&mut design).unwrap();

    assert_eq!(
        tool.events(),
        vec![Event::Place("empty".into()), Event::Route("empty".into())]
    );
    assert_eq!(report.count(Dispatch::Placement), 1);
    assert!(design.circuit(empty).is_implemented());
    assert_eq!(fs::read_to_string(dir.join("empty.sym")).unwrap(), "");
}

#[test]
fn device_root_is_generated_unflipped() {
    let dir = test_dir("device_root_is_generated_unflipped");
    let (mut design, _, _) = amp_design();
    let nch = design.circuit_id_named("nch").unwrap();
    let tool = Recorder::default();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    flow.implement(&mut design, nch).unwrap();

    assert_eq!(tool.events(), vec![device("nch", false)]);
    assert!(design.circuit(nch).is_implemented());
    assert!(!dir.join("nch.sym").exists());
}

#[test]
fn empty_design_has_no_root() {
    let dir = test_dir("empty_design_has_no_root");
    let mut flow = Flow::new(params(&dir), Strategies::uniform(Recorder::default()));
    assert!(matches!(flow.run(&mut Design::new()), Err(Error::NoRoot)));
}

#[test]
fn strategy_failure_aborts_run() {
    let dir = test_dir("strategy_failure_aborts_run");
    let (mut design, amp, top) = amp_design();
    let tool = Recorder {
        fail_place: Some("top"),
        ..Default::default()
    };

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    let err = flow.run(&mut design).unwrap_err();

    assert!(matches!(err, Error::Strategy(_)));
    assert!(err.to_string().contains("failed to place `top`"));
    assert!(design.circuit(amp).is_implemented());
    assert!(!design.circuit(top).is_implemented());
    assert!(!tool
        .events()
        .iter()
        .any(|event| matches!(event, Event::Route(_))));
}

#[test]
fn generates_constraints_without_implementing() {
    let dir = test_dir("generates_constraints_without_implementing");
    let (design, amp, top) = amp_design();
    let tool = Recorder::default();

    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));
    let maps = flow.generate_constraints(&design).unwrap();

    let ids: Vec<_> = maps.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![amp, top]);
    assert_eq!(maps[0].1.get("M1").map(|s| s.as_str()), Some("M2"));
    assert!(maps[1].1.is_empty());
    assert!(tool.events().is_empty());
    assert!(!dir.join("INVD4BWP_LVT.sym").exists());
}

#[test]
fn params_have_defaults() {
    let params: Params = toml::from_str("").unwrap();
    assert_eq!(params, Params::default());
    assert_eq!(params.result_dir, PathBuf::from("."));
    assert_eq!(params.psub_layer(), 6);
    assert!(params.is_std_cell("DFCNQD2BWP_LVT"));
    assert!(!params.is_std_cell("amp"));
    assert_eq!(params.wire_width.digital, vec![[0.0, 0.1], [100.0, 0.12]]);
    assert_eq!(params.via_cuts.power[1], ViaCutRule(100.0, 9, 3, 3));
    assert_relative_eq!(params.small_module_area_threshold, 60.0);
    assert!(params.tool("place").is_none());
}

#[test]
fn params_load_overrides() {
    let dir = test_dir("params_load_overrides");
    let path = dir.join("flow.toml");
    fs::write(
        &path,
        r#"
netlist = "design.toml"
std_cells = ["SR_Latch_LVT"]
power_layer = 4
psub_layer = 2

[via_cuts]
analog = [[0, 2, 1, 2], [50, 4, 2, 2]]

[tools]
place = "placer {{ cell }}"
"#,
    )
    .unwrap();

    let params = Params::load(&path).unwrap();
    assert_eq!(params.netlist, Some(PathBuf::from("design.toml")));
    assert_eq!(params.std_cells, vec![ArcStr::from("SR_Latch_LVT")]);
    assert_eq!(params.psub_layer(), 2);
    assert_eq!(params.via_cuts.analog[1], ViaCutRule(50.0, 4, 2, 2));
    assert_eq!(params.via_cuts.digital, crate::params::ViaCuts::default().digital);
    assert_eq!(params.tool("place"), Some("placer {{ cell }}"));
    assert_eq!(params.vdd_net_names, Params::default().vdd_net_names);
}

#[test]
fn load_requires_netlist() {
    assert!(matches!(
        FlowDb::load(Params::default()),
        Err(Error::MissingNetlist)
    ));
}

#[test]
fn load_reads_and_post_processes_design() {
    let dir = test_dir("load_reads_and_post_processes_design");
    let (design, amp, top) = amp_design();
    fs::write(dir.join("design.toml"), toml::to_string(&design).unwrap()).unwrap();

    let db = FlowDb::load(Params {
        netlist: Some("design.toml".into()),
        ..params(&dir)
    })
    .unwrap();

    assert_eq!(db.design.root(), Some(top));
    let amp = db.design.circuit(amp);
    let vss = amp.net(cktdb::NetId(3));
    assert!(vss.flags().vss);
    assert!(vss.flags().analog);
    let top = db.design.circuit(top);
    assert!(top.net(cktdb::NetId(1)).flags().digital);
    assert!(top.net(cktdb::NetId(2)).flags().vdd);
    assert!(top.net(cktdb::NetId(0)).flags().analog);
}

#[test]
fn load_rejects_invalid_design() {
    let dir = test_dir("load_rejects_invalid_design");
    let (mut design, _, _) = amp_design();
    design.add_circuit(Circuit::new("amp", ImplType::Unset));
    fs::write(dir.join("design.toml"), toml::to_string(&design).unwrap()).unwrap();

    let err = FlowDb::load(Params {
        netlist: Some("design.toml".into()),
        ..params(&dir)
    })
    .unwrap_err();
    assert!(matches!(err, Error::InvalidDesign { num_errors: 1 }));
}

#[test]
fn load_reports_missing_file() {
    let dir = test_dir("load_reports_missing_file");
    let err = FlowDb::load(Params {
        netlist: Some("missing.toml".into()),
        ..params(&dir)
    })
    .unwrap_err();
    match err {
        Error::Read { path, .. } => assert_eq!(path, dir.join("missing.toml")),
        other => panic!("expected a read error, got {other:?}"),
    }
}

/// `a` instantiates `b`, which instantiates `a` again.
fn cyclic_design() -> Design {
    let mut design = Design::new();
    let mut a = Circuit::new("a", ImplType::Unset);
    a.add_node("X0", CircuitId(1));
    design.add_circuit(a);
    let mut b = Circuit::new("b", ImplType::Unset);
    b.add_node("Y0", CircuitId(0));
    design.add_circuit(b);
    design
}

#[test]
fn cyclic_hierarchy_aborts_run() {
    let dir = test_dir("cyclic_hierarchy_aborts_run");
    let tool = Recorder::default();
    let mut flow = Flow::new(params(&dir), Strategies::uniform(tool.clone()));

    let mut design = cyclic_design();
    let err = flow.run(&mut design).unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
    assert!(!design.circuit(CircuitId(0)).is_implemented());
    assert!(!design.circuit(CircuitId(1)).is_implemented());
    assert!(tool.events().is_empty());

    let mut design = Design::new();
    let mut a = Circuit::new("a", ImplType::Unset);
    a.add_node("X0", CircuitId(0));
    let a = design.add_circuit(a);
    match flow.implement(&mut design, a) {
        Err(Error::Cycle { circuit }) => assert_eq!(circuit, "a"),
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn load_rejects_cyclic_design() {
    let dir = test_dir("load_rejects_cyclic_design");
    fs::write(
        dir.join("design.toml"),
        toml::to_string(&cyclic_design()).unwrap(),
    )
    .unwrap();

    let err = FlowDb::load(Params {
        netlist: Some("design.toml".into()),
        ..params(&dir)
    })
    .unwrap_err();
    assert!(matches!(err, Error::InvalidDesign { num_errors: 1 }));
}

#[test]
fn load_rejects_dangling_pin() {
    let dir = test_dir("load_rejects_dangling_pin");
    let text = r#"
        [[circuits]]
        name = "nch"
        impl_type = { Device = "Nmos" }

        [[circuits]]
        name = "top"
        nets = [{ name = "a" }]
        nodes = [{ name = "M1", graph = 0, pins = [7] }]
    "#;
    fs::write(dir.join("design.toml"), text).unwrap();

    let err = FlowDb::load(Params {
        netlist: Some("design.toml".into()),
        ..params(&dir)
    })
    .unwrap_err();
    assert!(matches!(err, Error::InvalidDesign { num_errors: 1 }));
}
