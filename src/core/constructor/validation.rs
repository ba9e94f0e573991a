use std::collections::HashSet;

use crate::models::ResolvedEdge;

use super::FlatWiringPlan;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("Path error: `{0}` is not a component in the tree")]
    PathError(String),
    #[error("Class error: {0}")]
    ClassError(String),
    #[error("Naming error: {0}")]
    NamingError(String),
}

#[derive(Debug, Clone, Default)]
pub struct SynthesisReport {
    pub skipped_edges: Vec<ResolvedEdge>,
    pub warnings: Vec<String>,
    pub errors: Vec<SynthesisError>,
    pub is_valid: bool,
}

impl SynthesisReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_error(&mut self, error: SynthesisError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn skip_edge(&mut self, edge: &ResolvedEdge) {
        self.add_warning(format!(
            "Skipping unresolved connection {} --> {} [{}]",
            edge.origin_path, edge.destination_path, edge.interface
        ));
        self.skipped_edges.push(edge.clone());
    }

    /// Returns a summary of the synthesis results
    pub fn summary(&self) -> String {
        let mut summary = Vec::new();

        if !self.skipped_edges.is_empty() {
            summary.push(format!("Skipped {} unresolved connections", self.skipped_edges.len()));
        }

        if !self.warnings.is_empty() {
            summary.push(format!("{} warnings", self.warnings.len()));
        }

        if !self.errors.is_empty() {
            summary.push(format!("{} errors", self.errors.len()));
        }

        if summary.is_empty() {
            "All connections converted".to_string()
        } else {
            summary.join(", ")
        }
    }
}

impl FlatWiringPlan {
    /// Build-time findings plus structural checks on every class that needs
    /// patching.
    pub fn validate(&self) -> SynthesisReport {
        let mut report = self.report.clone();

        for class in self.pending_classes() {
            if class.header_path.is_none() {
                report.add_error(SynthesisError::ClassError(format!(
                    "{} has no header file to patch",
                    class.class_name
                )));
            }
            let needs_source = !class.ports.is_empty()
                || !class.accessors.is_empty()
                || self.statements_for(&class.class_name).next().is_some();
            if needs_source && class.impl_path.is_none() {
                report.add_error(SynthesisError::ClassError(format!(
                    "{} has no implementation file to patch",
                    class.class_name
                )));
            }

            let mut names = HashSet::new();
            let generated = class
                .ports
                .iter()
                .map(|port| port.setter_name.as_str())
                .chain(class.accessors.iter().map(|accessor| accessor.method_name.as_str()));
            for name in generated {
                if !names.insert(name) {
                    report.add_error(SynthesisError::NamingError(format!(
                        "{} would get two methods named {name}",
                        class.class_name
                    )));
                }
            }
        }

        for statement in &self.statements {
            if !self.classes.contains_key(&statement.parent_class) {
                report.add_error(SynthesisError::ClassError(format!(
                    "wiring for {} targets unknown class {}",
                    statement.parent_path, statement.parent_class
                )));
            }
        }

        report
    }
}
