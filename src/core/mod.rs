use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

pub mod constructor;
pub mod decode;
pub mod patch;
pub mod registry;
pub mod render;
pub mod resolver;

pub use constructor::FlatWiringPlan;
pub use decode::{DecodeError, SourceDecoder};
pub use registry::{scan_project, ClassRegistry, HierarchyError, SourceUnit, UnitKind};
pub use resolver::{resolve_connections, Resolution, ResolveConfig};

use crate::config::PortwireConfig;
use crate::models::{AnalysisExport, ComponentNode, Diagnostic};

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("No *{suffix} directories with headers found under {}. Run from the project root.", root.display())]
    NoSourceUnits { root: PathBuf, suffix: String },
    #[error("Failed to scan {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// Result of analysing one root class.
#[derive(Debug)]
pub struct Analysis {
    pub root_class: String,
    pub registry: ClassRegistry,
    pub tree: ComponentNode,
    pub resolution: Resolution,
    /// File- and class-level diagnostics. Edge diagnostics live on the edges.
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn export(&self) -> AnalysisExport {
        AnalysisExport {
            root_class: self.root_class.clone(),
            component_tree: self.tree.clone(),
            connections: self.resolution.edges.clone(),
            classes: self.registry.locations(),
        }
    }
}

/// Scans `project_root` and analyses the hierarchy under `root_class`.
pub fn analyze_project(project_root: &Path, root_class: &str, config: &PortwireConfig) -> Result<Analysis, AnalyzeError> {
    let scanned = scan_project(project_root, &config.package_suffix).map_err(|source| AnalyzeError::Scan {
        root: project_root.to_path_buf(),
        source,
    })?;
    if scanned.headers.is_empty() {
        return Err(AnalyzeError::NoSourceUnits {
            root: project_root.to_path_buf(),
            suffix: config.package_suffix.clone(),
        });
    }
    let (units, mut diagnostics) = scanned.load();
    let mut analysis = analyze_units(&units, root_class, config)?;
    diagnostics.append(&mut analysis.diagnostics);
    analysis.diagnostics = diagnostics;
    Ok(analysis)
}

/// Analyses already-loaded source units.
pub fn analyze_units(units: &[SourceUnit], root_class: &str, config: &PortwireConfig) -> Result<Analysis, AnalyzeError> {
    let (registry, diagnostics) = ClassRegistry::build(units, config)?;
    let tree = registry.build_tree(root_class)?;
    let resolution = resolve_connections(&registry, &tree, &config.resolve_config());
    info!(
        root = root_class,
        components = tree.node_count(),
        connections = resolution.edges.len(),
        "analysis complete"
    );
    Ok(Analysis {
        root_class: root_class.to_string(),
        registry,
        tree,
        resolution,
        diagnostics,
    })
}
