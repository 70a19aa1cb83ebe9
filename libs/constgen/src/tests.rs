use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cktdb::{CapProp, Circuit, CircuitId, Design, DeviceKind, ImplType, MosProp, NetId};
use test_log::test;

use crate::error::{Error, Registration};
use crate::init_obj::render_init_obj;
use crate::primary::ensure_stable;
use crate::request::{MOS_PIN_TYPES, PASSIVE_PIN_TYPES};
use crate::*;

const BUILD_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

/// Returns a fresh, empty scratch directory for the given test.
fn test_dir(test_name: &str) -> PathBuf {
    let dir = PathBuf::from(BUILD_DIR).join(test_name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Two matched NMOS devices `M1` and `M2` sharing a tail net, plus a `top` cell
/// instantiating the pair.
fn diff_pair() -> (Design, CircuitId, CircuitId) {
    let mut design = Design::new();
    let nch = design.phy_mut().add_nch(MosProp {
        width: 1e-6,
        length: 1e-7,
        num_fingers: 2,
    });
    let nmos = design.add_circuit(Circuit::device("nch", DeviceKind::Nmos, nch));

    let mut diff = Circuit::new("diff", ImplType::Unset);
    let inp = diff.add_net("inp");
    let inn = diff.add_net("inn");
    let tail = diff.add_net("tail");
    let vss = diff.add_net("vss");
    for (name, drain, gate) in [("M1", inn, inp), ("M2", inp, inn)] {
        let m = diff.add_node(name, nmos);
        diff.connect(m, drain);
        diff.connect(m, gate);
        diff.connect(m, tail);
        diff.connect(m, vss);
    }
    let diff = design.add_circuit(diff);

    let mut top = Circuit::new("top", ImplType::Unset);
    let a = top.add_net("a");
    let x = top.add_node("X1", diff);
    top.connect(x, a);
    let top = design.add_circuit(top);

    (design, diff, top)
}

#[derive(Clone, Default)]
struct RecordingSystem {
    calls: Rc<RefCell<Vec<CircuitId>>>,
}

impl SystemSymmetry for RecordingSystem {
    fn system_sym(
        &self,
        _design: &Design,
        circuit: CircuitId,
        _out_dir: &Path,
    ) -> anyhow::Result<Vec<SymRecord>> {
        self.calls.borrow_mut().push(circuit);
        Ok(vec![SymRecord::single("X1")])
    }
}

#[test]
fn classifies_primary_cells() {
    let (design, diff, top) = diff_pair();
    assert!(is_primary(&design, diff));
    assert!(!is_primary(&design, top));

    let mut design = design;
    let empty = design.add_circuit(Circuit::new("empty", ImplType::Composite));
    assert!(is_primary(&design, empty));
}

#[test]
fn builds_primary_request_in_index_order() {
    let (design, diff, _) = diff_pair();
    let req = primary_request(&design, diff).unwrap();

    let nets: Vec<_> = req.nets().iter().map(|n| n.idx).collect();
    assert_eq!(nets, vec![NetId(0), NetId(1), NetId(2), NetId(3)]);
    assert_eq!(req.insts().len(), 2);

    let m2 = &req.insts()[1];
    assert_eq!(m2.name, "M2");
    assert_eq!(m2.params.kind, DeviceKind::Nmos);
    assert_eq!(m2.params.count, 2);
    let roles: Vec<_> = m2.pins.iter().map(|p| p.pin_type).collect();
    assert_eq!(roles, MOS_PIN_TYPES.to_vec());
    assert_eq!(m2.net(PinType::D), Some(NetId(0)));
    assert_eq!(m2.net(PinType::G), Some(NetId(1)));
}

#[test]
fn passive_pins_use_passive_roles() {
    let mut design = Design::new();
    let cap = design.phy_mut().add_capacitor(CapProp {
        width: 1e-7,
        length: 5e-6,
        num_fingers: 8,
    });
    let cap = design.add_circuit(Circuit::device("cfmom", DeviceKind::Capacitor, cap));
    let mut ckt = Circuit::new("cdac", ImplType::Unset);
    let top = ckt.add_net("top");
    let bot = ckt.add_net("bot");
    let c = ckt.add_node("C0", cap);
    ckt.connect(c, top);
    ckt.connect(c, bot);
    let ckt = design.add_circuit(ckt);

    let req = primary_request(&design, ckt).unwrap();
    let roles: Vec<_> = req.insts()[0].pins.iter().map(|p| p.pin_type).collect();
    assert_eq!(roles, PASSIVE_PIN_TYPES[..2].to_vec());
}

#[test]
fn composite_instance_in_primary_request_is_fatal() {
    let (design, _, top) = diff_pair();
    match primary_request(&design, top) {
        Err(Error::NonInstanceInComposite { circuit, instance }) => {
            assert_eq!(circuit, "top");
            assert_eq!(instance, "X1");
        }
        other => panic!("expected NonInstanceInComposite, got {other:?}"),
    }
}

#[test]
fn registration_mismatch_is_fatal() {
    assert!(ensure_stable(Registration::Net, 3, 3).is_ok());
    match ensure_stable(Registration::Instance, 1, 2) {
        Err(Error::IndexMismatch {
            what: Registration::Instance,
            expected: 1,
            actual: 2,
        }) => (),
        other => panic!("expected IndexMismatch, got {other:?}"),
    }
}

#[test]
fn missing_tech_entry_aborts_before_writing() {
    let dir = test_dir("missing_tech_entry_aborts_before_writing");
    let mut design = Design::new();
    let res = design.add_circuit(Circuit::device("rppoly", DeviceKind::Resistor, 0));
    let mut ckt = Circuit::new("rdiv", ImplType::Unset);
    ckt.add_node("R0", res);
    let ckt = design.add_circuit(ckt);

    let mut gen = ConstraintGenerator::new(&dir);
    let err = gen.generate(&design, ckt).unwrap_err();
    assert!(matches!(
        err,
        Error::Db(cktdb::error::Error::MissingTechEntry {
            kind: DeviceKind::Resistor,
            idx: 0
        })
    ));
    assert!(!gen.sym_path("rdiv").exists());
    assert_eq!(gen.artifacts_written(), 0);
}

#[test]
fn decodes_existing_artifact_without_regenerating() {
    let dir = test_dir("decodes_existing_artifact_without_regenerating");
    let (design, diff, _) = diff_pair();
    fs::write(dir.join("diff.sym"), "M2 M1\n").unwrap();

    let mut gen = ConstraintGenerator::new(&dir);
    let map = gen.generate(&design, diff).unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("M2").map(|s| s.as_str()), Some("M1"));
    assert!(map.is_mirrored("M1"));
    assert!(!map.is_mirrored("M2"));
    assert_eq!(gen.artifacts_written(), 0);
    assert_eq!(fs::read_to_string(dir.join("diff.sym")).unwrap(), "M2 M1\n");
}

#[test]
fn generation_is_idempotent() {
    let dir = test_dir("generation_is_idempotent");
    let (design, diff, _) = diff_pair();

    let mut gen = ConstraintGenerator::new(&dir);
    let first = gen.generate(&design, diff).unwrap();
    assert_eq!(gen.artifacts_written(), 1);
    let second = gen.generate(&design, diff).unwrap();
    assert_eq!(first, second);
    assert_eq!(gen.artifacts_written(), 1);

    // A later run reuses the artifact on disk.
    let mut gen = ConstraintGenerator::new(&dir);
    let third = gen.generate(&design, diff).unwrap();
    assert_eq!(first, third);
    assert_eq!(gen.artifacts_written(), 0);
}

#[test]
fn built_in_solver_pairs_matched_devices() {
    let dir = test_dir("built_in_solver_pairs_matched_devices");
    let (design, diff, _) = diff_pair();

    let mut gen = ConstraintGenerator::new(&dir);
    let map = gen.generate(&design, diff).unwrap();
    assert_eq!(map.get("M1").map(|s| s.as_str()), Some("M2"));
    assert!(map.is_mirrored("M2"));
    assert_eq!(fs::read_to_string(gen.sym_path("diff")).unwrap(), "M1 M2\n");
}

#[test]
fn built_in_solver_skips_mismatched_devices() {
    let (mut design, diff, _) = diff_pair();
    let wide = design.phy_mut().add_nch(MosProp {
        width: 2e-6,
        length: 1e-7,
        num_fingers: 2,
    });
    let wide = design.add_circuit(Circuit::device("nch_wide", DeviceKind::Nmos, wide));
    let ckt = design.circuit_mut(diff);
    let m3 = ckt.add_node("M3", wide);
    for net in 0..4 {
        ckt.connect(m3, NetId(net));
    }

    let req = primary_request(&design, diff).unwrap();
    let records = MatchedDeviceSolver.solve(&req).unwrap();
    assert_eq!(records, vec![SymRecord::pair("M1", "M2")]);
}

#[test]
fn non_primary_cells_use_system_engine() {
    let dir = test_dir("non_primary_cells_use_system_engine");
    let (design, _, top) = diff_pair();
    let system = RecordingSystem::default();

    let mut gen = ConstraintGenerator::new(&dir).with_system(system.clone());
    let map = gen.generate(&design, top).unwrap();
    assert!(map.is_empty());
    assert_eq!(*system.calls.borrow(), vec![top]);
    assert_eq!(fs::read_to_string(gen.sym_path("top")).unwrap(), "X1\n");
}

#[test]
fn empty_composite_yields_empty_map() {
    let dir = test_dir("empty_composite_yields_empty_map");
    let mut design = Design::new();
    let empty = design.add_circuit(Circuit::new("empty", ImplType::Composite));

    let mut gen = ConstraintGenerator::new(&dir);
    let map = gen.generate(&design, empty).unwrap();
    assert!(map.is_empty());
    assert!(gen.sym_path("empty").is_file());
}

#[test]
fn decode_ignores_short_lines() {
    let map = SymmetryMap::decode("\nM1\nM3 M4 M5\n   \nC1\tC2\n");
    let pairs: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    assert_eq!(pairs, vec![("M3", "M4"), ("C1", "C2")]);
}

#[test]
fn renders_init_obj() {
    let (design, diff, top) = diff_pair();
    let text = render_init_obj(&design, diff).unwrap();
    let expected = "Inst\n0\nNMOS\nM1\n1000000e-12 100000e-12 2\n1\n0\n2\n3\n\
                    Inst\n1\nNMOS\nM2\n1000000e-12 100000e-12 2\n0\n1\n2\n3\n\
                    NET\n0\ninp\nNET\n1\ninn\nNET\n2\ntail\nNET\n3\nvss\n";
    assert_eq!(text, expected);

    assert!(matches!(
        render_init_obj(&design, top),
        Err(Error::NonInstanceInComposite { .. })
    ));
}

#[test]
fn writes_init_obj_file() {
    let dir = test_dir("writes_init_obj_file");
    let (design, diff, _) = diff_pair();
    let path = crate::init_obj::write_init_obj(&design, diff, dir.join("init")).unwrap();
    assert_eq!(path, dir.join("init").join("diff.initObj"));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        render_init_obj(&design, diff).unwrap()
    );
}
