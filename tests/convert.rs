mod common;

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use portwire::config::PortwireConfig;
use portwire::core::patch::{PatchError, MECHANISM_BANNER, WIRING_BANNER};
use portwire::core::render::render_preview;
use portwire::core::FlatWiringPlan;
use portwire::Portwire;

use common::{fixture_copy, fixture_root, read, ROOT_CLASS};

fn plan_for(root: &Path) -> (FlatWiringPlan, PortwireConfig) {
    let config = PortwireConfig::discover(root, None).unwrap();
    let analysis = Portwire::analyze(root, ROOT_CLASS, &config).unwrap();
    (FlatWiringPlan::build(&analysis.export(), &config), config)
}

#[test]
fn plan_places_wiring_in_the_nearest_common_ancestor() {
    let (plan, _) = plan_for(&fixture_root());
    let statements: Vec<(&str, &str)> = plan
        .statements
        .iter()
        .map(|s| (s.parent_class.as_str(), s.statement.as_str()))
        .collect();
    assert_eq!(
        statements,
        vec![
            (
                "PartitionCls",
                "EgiMgr.GetEgiLruMgr().GetEgi1ModController().SetEgiOut(&RadaltMgr.GetRadaltLruMgr());"
            ),
            ("PartitionCls", "EgiMgr.GetEgiLruMgr().SetEgiOut(&RadaltMgr.GetRadaltLruMgr());"),
            ("PartitionCls", "RadaltMgr.GetRadaltLruMgr().SetRadaltOut(&EgiMgr.GetEgiCmp());"),
            ("EgiMgrCls", "EgiLruMgr.GetEgi1ModController().SetCommandOut(&EgiCmp);"),
            ("RadaltMgrCls", "SetEgiOut(&RadaltLruMgr);"),
        ]
    );

    let report = plan.validate();
    assert!(report.is_valid, "{:?}", report.errors);
    assert_eq!(report.skipped_edges.len(), 1);
    assert_eq!(report.summary(), "Skipped 1 unresolved connections, 1 warnings");

    let pending: Vec<&str> = plan.pending_classes().map(|class| class.class_name.as_str()).collect();
    assert_eq!(
        pending,
        vec![
            "PartitionCls",
            "EgiMgrCls",
            "EgiLruMgrCls",
            "EgiModControllerCls",
            "RadaltMgrCls",
            "RadaltLruMgrCls",
        ]
    );
}

#[test]
fn dry_run_preview_touches_no_files() {
    let dir = fixture_copy();
    let before = read(dir.path(), "PartitionPkg/src/PartitionCls.cpp");
    let (plan, _) = plan_for(dir.path());

    let preview = render_preview(&plan);

    assert!(preview.contains("CLASS: EgiModControllerCls"));
    assert!(preview.contains("    Ans611ControlIfc* m_commandOut{nullptr};"));
    assert!(preview.contains("    // Egi1ModController sends Ans611ControlIfc to EgiCmp\n"));
    assert!(!preview.contains("CLASS: EgiCmpCls"));
    assert_eq!(read(dir.path(), "PartitionPkg/src/PartitionCls.cpp"), before);
}

#[test]
fn apply_rewrites_every_pending_class() {
    let dir = fixture_copy();
    let root = dir.path();
    let original_partition = read(root, "PartitionPkg/src/PartitionCls.cpp");
    let (plan, config) = plan_for(root);

    let summary = Portwire::apply(&plan, &config, true);
    assert!(summary.is_success(), "{:?}", summary.failed);
    assert_eq!(summary.modified.len(), 12);
    assert!(summary.unchanged.is_empty());

    let partition = read(root, "PartitionPkg/src/PartitionCls.cpp");
    assert!(partition.contains(&format!(
        "EgiStatusIfc());\n\n    {WIRING_BANNER}\n\
         \x20   // Egi1ModController sends EgiExtDataIfc to RadaltLruMgr\n\
         \x20   EgiMgr.GetEgiLruMgr().GetEgi1ModController().SetEgiOut(&RadaltMgr.GetRadaltLruMgr());\n\
         \x20   // EgiLruMgr sends EgiExtDataIfc to RadaltLruMgr\n\
         \x20   EgiMgr.GetEgiLruMgr().SetEgiOut(&RadaltMgr.GetRadaltLruMgr());\n\
         \x20   // RadaltLruMgr sends RadaltExtDataIfc to EgiCmp\n\
         \x20   RadaltMgr.GetRadaltLruMgr().SetRadaltOut(&EgiMgr.GetEgiCmp());\n}}"
    )));
    assert!(partition.contains(MECHANISM_BANNER));
    assert!(partition.contains("EgiMgrCls& PartitionCls::GetEgiMgr()\n{\n    return EgiMgr;\n}\n"));
    assert_eq!(read(root, "PartitionPkg/src/PartitionCls.cpp.bak"), original_partition);

    let partition_h = read(root, "PartitionPkg/inc/PartitionCls.h");
    assert!(partition_h.contains("public:\n    EgiMgrCls& GetEgiMgr();\n    RadaltMgrCls& GetRadaltMgr();\n"));

    assert!(read(root, "EgiMgrPkg/src/EgiMgrCls.cpp")
        .contains("    // Egi1ModController sends Ans611ControlIfc to EgiCmp\n    EgiLruMgr.GetEgi1ModController().SetCommandOut(&EgiCmp);\n"));

    let controller_h = read(root, "EgiMgrPkg/inc/EgiModControllerCls.h");
    assert!(controller_h.contains(
        "public:\n    void SetEgiOut(EgiExtDataIfc* port);\n    void SetCommandOut(Ans611ControlIfc* port);\n    EgiModControllerCls();"
    ));
    assert!(controller_h.contains(
        "ItsControlOutPortAns611ControlIfc;\nprivate:\n    EgiExtDataIfc* m_egiOut{nullptr};\n    Ans611ControlIfc* m_commandOut{nullptr};\n};"
    ));

    let radalt = read(root, "RadaltMgrPkg/src/RadaltMgrCls.cpp");
    assert!(radalt.contains("    // RadaltMgr sends EgiExtDataIfc to RadaltLruMgr\n    SetEgiOut(&RadaltLruMgr);\n}"));
    assert!(radalt.contains("void RadaltMgrCls::SetEgiOut(EgiExtDataIfc* port)\n{\n    m_egiOut = port;\n}\n"));

    assert_eq!(read(root, "EgiCmpPkg/src/EgiCmpCls.cpp"), read(&fixture_root(), "EgiCmpPkg/src/EgiCmpCls.cpp"));
}

#[test]
fn second_apply_changes_nothing() {
    let dir = fixture_copy();
    let (plan, config) = plan_for(dir.path());

    let first = Portwire::apply(&plan, &config, false);
    let after_first = read(dir.path(), "PartitionPkg/src/PartitionCls.cpp");
    let second = Portwire::apply(&plan, &config, false);

    assert_eq!(first.modified.len(), 12);
    assert!(second.modified.is_empty());
    assert_eq!(second.unchanged.len(), 12);
    assert_eq!(read(dir.path(), "PartitionPkg/src/PartitionCls.cpp"), after_first);
    assert_eq!(after_first.matches(WIRING_BANNER).count(), 1);
    assert!(!dir.path().join("PartitionPkg/src/PartitionCls.cpp.bak").exists());
}

#[test]
fn converted_project_still_analyzes_to_the_same_connections() {
    let dir = fixture_copy();
    let (plan, config) = plan_for(dir.path());
    let before = Portwire::analyze(dir.path(), ROOT_CLASS, &config).unwrap().resolution.edges;

    Portwire::apply(&plan, &config, false);

    let after = Portwire::analyze(dir.path(), ROOT_CLASS, &config).unwrap();
    assert_eq!(after.tree.node_count(), 7);
    assert_eq!(after.resolution.edges, before);
}

#[test]
fn class_missing_from_its_header_is_skipped_alone() {
    let dir = fixture_copy();
    let (plan, config) = plan_for(dir.path());
    let header = dir.path().join("RadaltMgrPkg/inc/RadaltLruMgrCls.h");
    let renamed = fs::read_to_string(&header).unwrap().replace("class RadaltLruMgrCls", "class RadaltLruMgrImpl");
    fs::write(&header, renamed).unwrap();

    let summary = Portwire::apply(&plan, &config, false);

    assert!(!summary.is_success());
    assert_eq!(summary.failed.len(), 1);
    let (class, error) = &summary.failed[0];
    assert_eq!(class, "RadaltLruMgrCls");
    assert!(matches!(error, PatchError::ClassNotFound { .. }));
    assert_eq!(summary.modified.len(), 10);
    assert_eq!(
        read(dir.path(), "RadaltMgrPkg/src/RadaltLruMgrCls.cpp"),
        read(&fixture_root(), "RadaltMgrPkg/src/RadaltLruMgrCls.cpp")
    );
}
