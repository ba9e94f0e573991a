//! Class registry and component hierarchy.
//!
//! Headers contribute class declarations, implementation units contribute
//! method bodies. Both are folded into one [`ClassFacts`] per class name, and
//! the component tree is expanded from a root class over those facts.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::PortwireConfig;
use crate::core::decode::{ClassDeclaration, DecodeError, MethodBody, SourceDecoder};
use crate::models::naming::{self, FieldRole};
use crate::models::{
    ClassFacts, ClassLocation, ComponentMember, ComponentNode, Diagnostic, MethodFacts,
};

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("Class '{0}' not found in the class registry")]
    UnknownRootClass(String),
    #[error("Cyclic component membership: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Header,
    Implementation,
}

#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub kind: UnitKind,
    pub text: String,
}

impl SourceUnit {
    /// Kind is taken from the extension: `.h`/`.hpp` are headers, anything
    /// else is an implementation unit.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let kind = match path.extension().and_then(|ext| ext.to_str()) {
            Some("h" | "hpp") => UnitKind::Header,
            _ => UnitKind::Implementation,
        };
        Self {
            path,
            kind,
            text: text.into(),
        }
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|stem| stem.to_str())
    }
}

/// Source files discovered under a project root, each list sorted.
#[derive(Debug, Default)]
pub struct ScannedFiles {
    pub headers: Vec<PathBuf>,
    pub implementations: Vec<PathBuf>,
}

impl ScannedFiles {
    /// Reads every discovered file. Unreadable files become diagnostics.
    pub fn load(&self) -> (Vec<SourceUnit>, Vec<Diagnostic>) {
        let mut units = Vec::new();
        let mut diagnostics = Vec::new();
        let all = self
            .headers
            .iter()
            .map(|path| (path, UnitKind::Header))
            .chain(self.implementations.iter().map(|path| (path, UnitKind::Implementation)));
        for (path, kind) in all {
            match fs::read_to_string(path) {
                Ok(text) => units.push(SourceUnit {
                    path: path.clone(),
                    kind,
                    text,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read source unit");
                    diagnostics.push(Diagnostic::warning(
                        path.display().to_string(),
                        format!("failed to read: {e}"),
                    ));
                }
            }
        }
        (units, diagnostics)
    }
}

/// Finds `*{suffix}/inc/*.h`, `*Ext{suffix}/*.h` and `*{suffix}/src/*.cpp`
/// directly under `project_root`.
pub fn scan_project(project_root: &Path, package_suffix: &str) -> io::Result<ScannedFiles> {
    let external_suffix = format!("Ext{package_suffix}");
    let mut packages: Vec<(PathBuf, String)> = fs::read_dir(project_root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            name.ends_with(package_suffix).then_some((path, name))
        })
        .collect();
    packages.sort();

    let mut scanned = ScannedFiles::default();
    for (package, name) in packages {
        scanned.headers.extend(files_with_extension(&package.join("inc"), "h")?);
        if name.ends_with(&external_suffix) {
            scanned.headers.extend(files_with_extension(&package, "h")?);
        }
        scanned
            .implementations
            .extend(files_with_extension(&package.join("src"), "cpp")?);
    }
    scanned.headers.sort();
    scanned.implementations.sort();
    info!(
        root = %project_root.display(),
        headers = scanned.headers.len(),
        implementations = scanned.implementations.len(),
        "scanned project"
    );
    Ok(scanned)
}

fn files_with_extension(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, ClassFacts>,
}

impl ClassRegistry {
    pub fn build(units: &[SourceUnit], config: &PortwireConfig) -> Result<(Self, Vec<Diagnostic>), DecodeError> {
        let mut decoder = SourceDecoder::new()?;
        let mut classes: IndexMap<String, ClassFacts> = IndexMap::new();
        let mut diagnostics = Vec::new();

        for unit in units.iter().filter(|unit| unit.kind == UnitKind::Header) {
            let label = unit.label();
            let declaration = match decoder.parse_class(&label, &unit.text) {
                Ok(Some(declaration)) => declaration,
                Ok(None) => continue,
                Err(e) => {
                    warn!(unit = %label, error = %e, "skipping header");
                    diagnostics.push(Diagnostic::warning(label, e.to_string()));
                    continue;
                }
            };
            if let Some(existing) = classes.get(&declaration.name) {
                let first = existing
                    .header_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                warn!(class = %declaration.name, kept = %first, ignored = %label, "duplicate class declaration");
                diagnostics.push(Diagnostic::warning(
                    declaration.name.clone(),
                    format!("declared again in {label}; keeping {first}"),
                ));
                continue;
            }
            let facts = class_facts(declaration, &unit.path, &config.component_suffix);
            classes.insert(facts.name.clone(), facts);
        }

        let registered: HashSet<String> = classes.keys().cloned().collect();
        for facts in classes.values_mut() {
            facts
                .component_members
                .retain(|member| registered.contains(&member.class_name));
        }

        for unit in units.iter().filter(|unit| unit.kind == UnitKind::Implementation) {
            let label = unit.label();
            let Some(facts) = unit.stem().and_then(|stem| classes.get_mut(stem)) else {
                debug!(unit = %label, "no registered class for implementation unit");
                continue;
            };
            match decoder.parse_methods(&label, &unit.text) {
                Ok(bodies) => {
                    let owner = facts.name.clone();
                    facts.impl_path = Some(unit.path.clone());
                    for body in bodies.into_iter().filter(|body| belongs_to(body, &owner)) {
                        if !facts.methods.contains_key(&body.name) {
                            facts.methods.insert(body.name.clone(), method_facts(body));
                        }
                    }
                }
                Err(e) => {
                    warn!(unit = %label, error = %e, "skipping implementation unit");
                    diagnostics.push(Diagnostic::warning(label, e.to_string()));
                }
            }
        }

        info!(classes = classes.len(), "built class registry");
        Ok((Self { classes }, diagnostics))
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassFacts> {
        self.classes.get(class_name)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassFacts> {
        self.classes.values()
    }

    /// File locations and bases of every registered class.
    pub fn locations(&self) -> IndexMap<String, ClassLocation> {
        self.classes
            .values()
            .map(|facts| {
                (
                    facts.name.clone(),
                    ClassLocation {
                        header_path: facts.header_path.clone(),
                        impl_path: facts.impl_path.clone(),
                        base_types: facts.base_types.iter().cloned().collect(),
                    },
                )
            })
            .collect()
    }

    /// Expands the component tree rooted at `root_class`.
    pub fn build_tree(&self, root_class: &str) -> Result<ComponentNode, HierarchyError> {
        if !self.contains(root_class) {
            return Err(HierarchyError::UnknownRootClass(root_class.to_string()));
        }
        let mut root = ComponentNode::root(root_class);
        let mut ancestry = vec![root_class.to_string()];
        self.expand(&mut root, &mut ancestry)?;
        debug!(root = root_class, nodes = root.node_count(), "built component tree");
        Ok(root)
    }

    fn expand(&self, node: &mut ComponentNode, ancestry: &mut Vec<String>) -> Result<(), HierarchyError> {
        let Some(facts) = self.classes.get(&node.class_name) else {
            return Ok(());
        };
        for member in &facts.component_members {
            if ancestry.contains(&member.class_name) {
                let mut chain = ancestry.clone();
                chain.push(member.class_name.clone());
                return Err(HierarchyError::Cycle { chain });
            }
            let mut child = ComponentNode::new(&member.name, &member.class_name);
            ancestry.push(member.class_name.clone());
            self.expand(&mut child, ancestry)?;
            ancestry.pop();
            node.children.push(child);
        }
        Ok(())
    }
}

fn belongs_to(body: &MethodBody, class_name: &str) -> bool {
    body.owner().map_or(true, |owner| owner == class_name)
}

fn class_facts(declaration: ClassDeclaration, header: &Path, component_suffix: &str) -> ClassFacts {
    let mut facts = ClassFacts::new(declaration.name);
    facts.header_path = Some(header.to_path_buf());
    facts.base_types = declaration.base_types.into_iter().collect();
    for field in declaration.fields {
        match naming::classify_field(&field.name, &field.type_name, field.is_pointer, component_suffix) {
            FieldRole::Port => facts.port_members.push(field.name),
            FieldRole::Component => facts.component_members.push(ComponentMember {
                name: field.name,
                class_name: field.type_name,
            }),
            FieldRole::Plain => {}
        }
    }
    facts
}

fn method_facts(body: MethodBody) -> MethodFacts {
    MethodFacts {
        kind: naming::classify_method(&body.name),
        statements: body.statements.iter().map(naming::classify_statement).collect(),
        relays: body.relays,
        name: body.name,
        qualified_name: body.qualified_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Statement;
    use pretty_assertions::assert_eq;

    fn header(class: &str, members: &str) -> String {
        format!("class {class}\n{{\npublic:\n    void InitRelations();\nprivate:\n{members}\n}};\n")
    }

    fn registry(units: Vec<SourceUnit>) -> (ClassRegistry, Vec<Diagnostic>) {
        ClassRegistry::build(&units, &PortwireConfig::default()).unwrap()
    }

    #[test]
    fn tree_follows_registered_component_members() {
        let (registry, diagnostics) = registry(vec![
            SourceUnit::new(
                "PartitionPkg/inc/PartitionCls.h",
                header(
                    "PartitionCls",
                    "    EgiMgrCls EgiMgr;\n    RadaltMgrCls RadaltMgr;\n    ExternalCls Outside;\n    EgiMgrCls* m_alias;",
                ),
            ),
            SourceUnit::new("EgiMgrPkg/inc/EgiMgrCls.h", header("EgiMgrCls", "    EgiLruMgrCls EgiLruMgr;")),
            SourceUnit::new("EgiMgrPkg/inc/EgiLruMgrCls.h", header("EgiLruMgrCls", "    int m_count;")),
            SourceUnit::new("RadaltMgrPkg/inc/RadaltMgrCls.h", header("RadaltMgrCls", "")),
        ]);
        assert!(diagnostics.is_empty());
        assert_eq!(registry.len(), 4);

        let tree = registry.build_tree("PartitionCls").unwrap();
        let paths: Vec<String> = tree.walk().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["", "EgiMgr", "EgiMgr.EgiLruMgr", "RadaltMgr"]);
        assert_eq!(tree.name, "root");
        assert_eq!(tree.class_name, "PartitionCls");
    }

    #[test]
    fn unknown_root_is_rejected() {
        let (registry, _) = registry(vec![SourceUnit::new(
            "PartitionPkg/inc/PartitionCls.h",
            header("PartitionCls", ""),
        )]);
        assert!(matches!(
            registry.build_tree("MissingCls"),
            Err(HierarchyError::UnknownRootClass(name)) if name == "MissingCls"
        ));
    }

    #[test]
    fn cyclic_membership_is_fatal() {
        let (registry, _) = registry(vec![
            SourceUnit::new("APkg/inc/ACls.h", header("ACls", "    BCls B;")),
            SourceUnit::new("BPkg/inc/BCls.h", header("BCls", "    ACls A;")),
        ]);
        match registry.build_tree("ACls") {
            Err(HierarchyError::Cycle { chain }) => assert_eq!(chain, vec!["ACls", "BCls", "ACls"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn repeated_member_types_are_not_cycles() {
        let (registry, _) = registry(vec![
            SourceUnit::new("PPkg/inc/PCls.h", header("PCls", "    ModCls Left;\n    ModCls Right;")),
            SourceUnit::new("PPkg/inc/ModCls.h", header("ModCls", "")),
        ]);
        let tree = registry.build_tree("PCls").unwrap();
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn duplicate_declarations_keep_the_first() {
        let (registry, diagnostics) = registry(vec![
            SourceUnit::new("APkg/inc/EgiCls.h", header("EgiCls", "    int m_a;")),
            SourceUnit::new("BPkg/inc/EgiCls.h", header("EgiCls", "    int m_b;")),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("EgiCls").unwrap().header_path,
            Some(PathBuf::from("APkg/inc/EgiCls.h"))
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn implementation_units_attach_by_file_stem() {
        let (registry, _) = registry(vec![
            SourceUnit::new(
                "RadaltMgrPkg/inc/RadaltMgrCls.h",
                header("RadaltMgrCls", "    EgiExtDataIfc* ItsItsRadaltEgiInPortEgiExtDataIfc;"),
            ),
            SourceUnit::new(
                "RadaltMgrPkg/src/RadaltMgrCls.cpp",
                r#"
void RadaltMgrCls::InitRelations()
{
    ItsItsRadaltEgiInPortEgiExtDataIfc = RadaltLruMgr.GetItsRadaltEgiInPortEgiExtDataIfc();
}

void HelperCls::InitRelations()
{
}
"#,
            ),
            SourceUnit::new("Orphan/src/OrphanCls.cpp", "void OrphanCls::Run() {}"),
        ]);
        let facts = registry.get("RadaltMgrCls").unwrap();
        assert!(facts.has_implementation());
        assert_eq!(facts.port_members, vec!["ItsItsRadaltEgiInPortEgiExtDataIfc"]);
        assert_eq!(facts.methods.len(), 1);
        assert_eq!(
            facts.method("InitRelations").unwrap().statements,
            vec![Statement::Assignment {
                target: "ItsItsRadaltEgiInPortEgiExtDataIfc".to_string(),
                value: "RadaltLruMgr.GetItsRadaltEgiInPortEgiExtDataIfc()".to_string(),
            }]
        );
    }

    #[test]
    fn scan_finds_package_headers_and_sources() {
        let root = tempfile::tempdir().unwrap();
        let write = |relative: &str| {
            let path = root.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        };
        write("EgiMgrPkg/inc/EgiMgrCls.h");
        write("EgiMgrPkg/src/EgiMgrCls.cpp");
        write("EgiMgrPkg/EgiLoose.h");
        write("EgiExtPkg/EgiExtDataIfc.h");
        write("Tools/inc/ToolCls.h");
        write("PartitionPkg/inc/PartitionCls.h");
        write("PartitionPkg/inc/notes.txt");

        let scanned = scan_project(root.path(), "Pkg").unwrap();
        let relative = |paths: &[PathBuf]| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.strip_prefix(root.path()).unwrap().display().to_string())
                .collect()
        };
        assert_eq!(
            relative(&scanned.headers),
            vec![
                "EgiExtPkg/EgiExtDataIfc.h",
                "EgiMgrPkg/inc/EgiMgrCls.h",
                "PartitionPkg/inc/PartitionCls.h",
            ]
        );
        assert_eq!(relative(&scanned.implementations), vec!["EgiMgrPkg/src/EgiMgrCls.cpp"]);
    }
}
