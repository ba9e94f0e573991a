//! Flat wiring synthesis.
//!
//! Turns resolved edges into a plan for direct producer-to-consumer wiring:
//! one output port per (interface, consumer) on every producer class, one
//! accessor per component member, and one wiring call per edge placed in the
//! nearest common ancestor of the two ends.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

mod link;
mod validation;
pub use link::{capitalize, derive_accessor_name, derive_port_name, AccessorPlan, PortPlan, WiringStatement};
pub use validation::{SynthesisError, SynthesisReport};

use crate::config::PortwireConfig;
use crate::models::{split_path, AnalysisExport, ClassLocation, ComponentNode, ResolvedEdge};

/// Everything to add to one class.
#[derive(Debug, Clone)]
pub struct ClassPlan {
    pub class_name: String,
    pub header_path: Option<PathBuf>,
    pub impl_path: Option<PathBuf>,
    pub base_types: Vec<String>,
    pub ports: Vec<PortPlan>,
    pub accessors: Vec<AccessorPlan>,
}

impl ClassPlan {
    fn new(class_name: &str, location: Option<&ClassLocation>) -> Self {
        let location = location.cloned().unwrap_or_default();
        Self {
            class_name: class_name.to_string(),
            header_path: location.header_path,
            impl_path: location.impl_path,
            base_types: location.base_types,
            ports: Vec::new(),
            accessors: Vec::new(),
        }
    }

    /// Port for `interface` towards `destination`, allocated on first use.
    /// Ports are keyed by (interface, destination): one pointer member holds
    /// a single consumer, so a class feeding two consumers of the same
    /// interface gets two ports. Name collisions inside the class get a
    /// numeric suffix starting at 2.
    fn port_for(&mut self, interface: &str, destination: &str, config: &PortwireConfig) -> &PortPlan {
        if let Some(index) = self
            .ports
            .iter()
            .position(|port| port.interface == interface && port.destination == destination)
        {
            return &self.ports[index];
        }

        let base = derive_port_name(interface, &config.port_aliases);
        let mut counter = 1;
        let mut member_name = format!("m_{base}Out");
        while self.ports.iter().any(|port| port.member_name == member_name) {
            counter += 1;
            member_name = format!("m_{base}Out{counter}");
        }
        let suffix = if counter > 1 { counter.to_string() } else { String::new() };
        self.ports.push(PortPlan {
            setter_name: format!("Set{}Out{suffix}", capitalize(&base)),
            member_name,
            interface: interface.to_string(),
            destination: destination.to_string(),
        });
        &self.ports[self.ports.len() - 1]
    }
}

#[derive(Debug, Clone)]
pub struct FlatWiringPlan {
    pub root_class: String,
    pub classes: IndexMap<String, ClassPlan>,
    pub statements: Vec<WiringStatement>,
    pub report: SynthesisReport,
}

impl FlatWiringPlan {
    pub fn build(export: &AnalysisExport, config: &PortwireConfig) -> Self {
        let mut plan = Self {
            root_class: export.root_class.clone(),
            classes: IndexMap::new(),
            statements: Vec::new(),
            report: SynthesisReport::new(),
        };
        plan.collect_accessors(export, config);

        let mut seen = IndexSet::new();
        for edge in &export.connections {
            if !seen.insert(edge.key()) {
                debug!(origin = %edge.origin_path, destination = %edge.destination_path, "duplicate edge");
                continue;
            }
            plan.add_edge(edge, &export.component_tree, config);
        }

        info!(
            classes = plan.pending_classes().count(),
            statements = plan.statements.len(),
            "built flat wiring plan"
        );
        plan
    }

    fn class_plan(&mut self, class_name: &str, export: &AnalysisExport) -> &mut ClassPlan {
        self.classes
            .entry(class_name.to_string())
            .or_insert_with(|| ClassPlan::new(class_name, export.classes.get(class_name)))
    }

    fn collect_accessors(&mut self, export: &AnalysisExport, config: &PortwireConfig) {
        for (_, node) in export.component_tree.walk() {
            let class_plan = self.class_plan(&node.class_name, export);
            for child in &node.children {
                if class_plan.accessors.iter().any(|accessor| accessor.member_name == child.name) {
                    continue;
                }
                class_plan.accessors.push(AccessorPlan {
                    method_name: derive_accessor_name(&child.name, &config.storage_prefixes, &config.component_suffix),
                    member_name: child.name.clone(),
                    return_type: child.class_name.clone(),
                });
            }
        }
    }

    fn add_edge(&mut self, edge: &ResolvedEdge, tree: &ComponentNode, config: &PortwireConfig) {
        if edge.unresolved {
            self.report.skip_edge(edge);
            return;
        }
        let Some(origin_class) = tree.class_at(&edge.origin_path) else {
            self.report.add_error(SynthesisError::PathError(edge.origin_path.clone()));
            return;
        };
        if !tree.contains(&edge.destination_path) {
            self.report.add_error(SynthesisError::PathError(edge.destination_path.clone()));
            return;
        }

        let Some(class_plan) = self.classes.get_mut(origin_class) else {
            self.report.add_error(SynthesisError::ClassError(format!(
                "{origin_class} is missing from the plan"
            )));
            return;
        };
        let setter = class_plan
            .port_for(&edge.interface, &edge.destination_path, config)
            .setter_name
            .clone();

        let from: Vec<&str> = split_path(&edge.origin_path).collect();
        let to: Vec<&str> = split_path(&edge.destination_path).collect();
        let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
        let parent_path = from[..common].join(".");
        let (Some(parent_class), Some(origin_chain), Some(destination_chain)) = (
            tree.class_at(&parent_path),
            accessor_chain(tree, &parent_path, &from[common..], config),
            accessor_chain(tree, &parent_path, &to[common..], config),
        ) else {
            self.report.add_error(SynthesisError::PathError(parent_path));
            return;
        };

        let comment = format!(
            "{} sends {} to {}",
            display_name(&from, &self.root_class),
            edge.interface,
            display_name(&to, &self.root_class)
        );
        let statement = WiringStatement::new(
            parent_class,
            &parent_path,
            &origin_chain,
            &setter,
            &destination_chain,
            comment,
        );
        if !self.statements.contains(&statement) {
            self.statements.push(statement);
        }
    }

    pub fn statements_for<'p>(&'p self, class_name: &'p str) -> impl Iterator<Item = &'p WiringStatement> + 'p {
        self.statements
            .iter()
            .filter(move |statement| statement.parent_class == class_name)
    }

    /// Classes that receive at least one port, accessor or wiring statement.
    pub fn pending_classes(&self) -> impl Iterator<Item = &ClassPlan> {
        self.classes.values().filter(|class| {
            !class.ports.is_empty()
                || !class.accessors.is_empty()
                || self.statements.iter().any(|s| s.parent_class == class.class_name)
        })
    }
}

fn display_name<'s>(segments: &[&'s str], root_class: &'s str) -> &'s str {
    segments.last().copied().unwrap_or(root_class)
}

/// Expression reaching `relative` from the node at `ancestor_path`: the first
/// member by name, every deeper member through its accessor.
pub fn accessor_chain(
    tree: &ComponentNode,
    ancestor_path: &str,
    relative: &[&str],
    config: &PortwireConfig,
) -> Option<String> {
    let mut node = tree.find(ancestor_path)?;
    let mut parts = Vec::with_capacity(relative.len());
    for (index, segment) in relative.iter().enumerate() {
        node = node.child(segment)?;
        if index == 0 {
            parts.push(segment.to_string());
        } else {
            parts.push(format!(
                "{}()",
                derive_accessor_name(segment, &config.storage_prefixes, &config.component_suffix)
            ));
        }
    }
    Some(parts.join("."))
}

/// Accessor expression from the node at `from` to the node at `to`, which
/// must lie in the subtree of `from`.
pub fn accessor_expression(tree: &ComponentNode, from: &str, to: &str, config: &PortwireConfig) -> Option<String> {
    let from_segments: Vec<&str> = split_path(from).collect();
    let to_segments: Vec<&str> = split_path(to).collect();
    if !to_segments.starts_with(&from_segments) {
        return None;
    }
    accessor_chain(tree, from, &to_segments[from_segments.len()..], config)
}
