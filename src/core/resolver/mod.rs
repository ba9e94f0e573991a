//! Connection resolution.
//!
//! Walks the component tree in pre-order and turns every wiring statement of
//! every registration method into producer-to-consumer edges. Setter targets
//! are followed down forwarding chains, getter arguments are followed to the
//! node that finally hands out the consumer.

mod trace;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

pub use trace::{Hop, TraceOutcome};
use trace::{Step, Tracer};

use crate::core::registry::ClassRegistry;
use crate::models::naming;
use crate::models::{
    ClassFacts, ComponentNode, Diagnostic, MethodKind, ResolvedEdge, Statement, UNKNOWN_INTERFACE,
};

pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfig {
    pub max_depth: usize,
    pub registration_method: String,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            registration_method: "InitRelations".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub edges: Vec<ResolvedEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedEdge> {
        self.edges.iter().filter(|edge| edge.unresolved)
    }

    /// Edges grouped by interface, interfaces in sorted order.
    pub fn by_interface(&self) -> BTreeMap<&str, Vec<&ResolvedEdge>> {
        let mut groups: BTreeMap<&str, Vec<&ResolvedEdge>> = BTreeMap::new();
        for edge in &self.edges {
            groups.entry(edge.interface.as_str()).or_default().push(edge);
        }
        groups
    }

    fn push(&mut self, edge: ResolvedEdge) {
        if let Some(diagnostic) = &edge.diagnostic {
            warn!(
                origin = %edge.origin_path,
                destination = %edge.destination_path,
                interface = %edge.interface,
                "unresolved connection: {diagnostic}"
            );
            self.diagnostics.push(Diagnostic::warning(
                format!("{} --> {} [{}]", edge.origin_path, edge.destination_path, edge.interface),
                diagnostic.clone(),
            ));
        }
        self.edges.push(edge);
    }
}

pub fn resolve_connections(registry: &ClassRegistry, tree: &ComponentNode, config: &ResolveConfig) -> Resolution {
    ConnectionResolver::new(registry, tree, config).resolve()
}

pub struct ConnectionResolver<'a> {
    registry: &'a ClassRegistry,
    root: &'a ComponentNode,
    config: &'a ResolveConfig,
    tracer: Tracer<'a>,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(registry: &'a ClassRegistry, root: &'a ComponentNode, config: &'a ResolveConfig) -> Self {
        Self {
            registry,
            root,
            config,
            tracer: Tracer::new(registry, config),
        }
    }

    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();
        for (path, node) in self.root.walk() {
            let Some(facts) = self.registry.get(&node.class_name) else {
                continue;
            };
            if !facts.has_implementation() {
                debug!(class = %facts.name, "no implementation unit, nothing to resolve");
                continue;
            }
            self.resolve_wirings(node, &path, facts, &mut resolution);
            self.resolve_relays(node, &path, facts, &mut resolution);
        }
        info!(
            edges = resolution.edges.len(),
            unresolved = resolution.unresolved().count(),
            "resolved connections"
        );
        resolution
    }

    fn resolve_wirings(&self, node: &ComponentNode, path: &str, facts: &ClassFacts, out: &mut Resolution) {
        let Some(registration) = facts.method(&self.config.registration_method) else {
            return;
        };
        let mut bindings: HashMap<&str, &str> = HashMap::new();
        for statement in &registration.statements {
            match statement {
                Statement::GetterBinding { variable, getter } => {
                    bindings.insert(variable, getter);
                }
                Statement::SetterCall {
                    object,
                    setter,
                    argument,
                } => {
                    let argument = bindings.get(argument.as_str()).copied().unwrap_or(argument);
                    self.resolve_wiring(node, path, object.as_deref(), setter, argument, out);
                }
                _ => {}
            }
        }
    }

    fn resolve_wiring(
        &self,
        node: &ComponentNode,
        path: &str,
        object: Option<&str>,
        setter: &str,
        argument: &str,
        out: &mut Resolution,
    ) {
        let interface = naming::interface_name(setter)
            .or_else(|| naming::interface_name(argument))
            .unwrap_or(UNKNOWN_INTERFACE);
        let origin = match object {
            Some(object) => self.tracer.trace_origin(node, path, object, setter),
            None => TraceOutcome::at(path),
        };
        let destination = self.tracer.trace_destination(Step::getter(node, path, argument));
        let problems = self.problems(&origin, &destination);

        out.push(edge(&origin.path, &destination.path, interface, &problems));
        for hop in origin.hops.iter().filter(|hop| hop.path != origin.path) {
            debug!(hop = %hop.path, interface = %hop.interface, "intermediate forwarding hop");
            out.push(edge(&hop.path, &destination.path, &hop.interface, &problems));
        }
    }

    /// Port re-emission: a receiver method relaying through `OUT_PORT` to a
    /// port member that the registration method assigns.
    fn resolve_relays(&self, node: &ComponentNode, path: &str, facts: &ClassFacts, out: &mut Resolution) {
        let receivers = facts
            .methods
            .values()
            .filter(|method| method.kind == MethodKind::Receiver);
        for method in receivers {
            for relay in method.relays.iter().filter(|relay| relay.method == method.name) {
                let member = relay.port_member();
                if facts
                    .port_member_source(&self.config.registration_method, &member)
                    .is_none()
                {
                    debug!(class = %facts.name, member = %member, "relayed port is wired from outside");
                    continue;
                }
                let origin = TraceOutcome::at(path);
                let destination = self.tracer.trace_destination(Step::port_member(node, path, &member));
                let problems = self.problems(&origin, &destination);
                out.push(edge(path, &destination.path, &relay.interface, &problems));
            }
        }
    }

    fn problems(&self, origin: &TraceOutcome, destination: &TraceOutcome) -> Vec<String> {
        let mut problems: Vec<String> = origin
            .problems
            .iter()
            .chain(&destination.problems)
            .cloned()
            .collect();
        if destination.is_complete() && !self.root.contains(&destination.path) {
            problems.push(format!("`{}` is not a component in the tree", destination.path));
        }
        problems
    }
}

fn edge(origin: &str, destination: &str, interface: &str, problems: &[String]) -> ResolvedEdge {
    if problems.is_empty() {
        ResolvedEdge::resolved(origin, destination, interface)
    } else {
        ResolvedEdge::unresolved(origin, destination, interface, problems.join("; "))
    }
}
