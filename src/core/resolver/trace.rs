//! Bounded chain following.
//!
//! A trace is a work-list of continuations. Each step either settles on a
//! path or yields successor steps one hop deeper; the hop bound is checked in
//! one place, before successors are scheduled.

use tracing::trace;

use super::ResolveConfig;
use crate::core::registry::ClassRegistry;
use crate::models::naming::{self, Identifier};
use crate::models::{join_path, ComponentNode, MethodFacts, UNKNOWN_INTERFACE};

/// One forwarding hop taken while tracing an origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub path: String,
    pub interface: String,
}

/// Result of following a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOutcome {
    /// Canonical endpoint: the first terminal reached, or the furthest path
    /// reached when the chain could not be completed.
    pub path: String,
    pub hops: Vec<Hop>,
    /// Why the chain could not be completed. Empty when it was.
    pub problems: Vec<String>,
    settled: bool,
}

impl TraceOutcome {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            settled: true,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.problems.is_empty()
    }

    fn settle(&mut self, path: String) {
        if !self.settled {
            self.path = path;
            self.settled = true;
        }
    }
}

pub(crate) enum Step<'t> {
    /// Follow setter `setter` into the class of `node`.
    Setter {
        node: &'t ComponentNode,
        path: String,
        setter: String,
    },
    /// Evaluate accessor expression `expr` in the scope of `scope`.
    Getter {
        scope: &'t ComponentNode,
        scope_path: String,
        expr: String,
    },
    /// Follow what port member `member` of `node` was assigned from.
    PortMember {
        node: &'t ComponentNode,
        path: String,
        member: String,
    },
    /// A path that cannot be followed any further.
    Dead { path: String, problem: String },
}

impl<'t> Step<'t> {
    pub(crate) fn getter(scope: &'t ComponentNode, scope_path: &str, expr: &str) -> Self {
        Step::Getter {
            scope,
            scope_path: scope_path.to_string(),
            expr: expr.to_string(),
        }
    }

    pub(crate) fn port_member(node: &'t ComponentNode, path: &str, member: &str) -> Self {
        Step::PortMember {
            node,
            path: path.to_string(),
            member: member.to_string(),
        }
    }
}

enum Advance<'t> {
    Settled { path: String, problem: Option<String> },
    /// `at` is where the chain stops if the bound forbids going further.
    Next {
        at: String,
        successors: Vec<(Step<'t>, Option<Hop>)>,
    },
}

struct Continuation<'t> {
    step: Step<'t>,
    depth: usize,
}

pub(crate) struct Tracer<'a> {
    registry: &'a ClassRegistry,
    config: &'a ResolveConfig,
}

impl<'a> Tracer<'a> {
    pub(crate) fn new(registry: &'a ClassRegistry, config: &'a ResolveConfig) -> Self {
        Self { registry, config }
    }

    /// Where a call `object.setter(...)` made in `scope` really lands.
    pub(crate) fn trace_origin(&self, scope: &ComponentNode, scope_path: &str, object: &str, setter: &str) -> TraceOutcome {
        let path = join_path(scope_path, object);
        match scope.child(object) {
            Some(node) => self.run(Step::Setter {
                node,
                path,
                setter: setter.to_string(),
            }),
            None => self.run(Step::Dead {
                problem: format!("setter target `{object}` is not a member of `{}`", scope.class_name),
                path,
            }),
        }
    }

    /// Which node consumes what `start` evaluates to.
    pub(crate) fn trace_destination(&self, start: Step<'_>) -> TraceOutcome {
        self.run(start)
    }

    fn run(&self, start: Step<'_>) -> TraceOutcome {
        let mut outcome = TraceOutcome::default();
        let mut work = vec![Continuation { step: start, depth: 0 }];

        while let Some(Continuation { step, depth }) = work.pop() {
            match self.advance(step) {
                Advance::Settled { path, problem } => {
                    trace!(path = %path, depth, "trace settled");
                    outcome.problems.extend(problem);
                    outcome.settle(path);
                }
                Advance::Next { at, successors } => {
                    if depth >= self.config.max_depth {
                        outcome.problems.push(format!(
                            "stopped at `{at}` after {} hops",
                            self.config.max_depth
                        ));
                        outcome.settle(at);
                        continue;
                    }
                    let mut scheduled = Vec::with_capacity(successors.len());
                    for (step, hop) in successors {
                        outcome.hops.extend(hop);
                        scheduled.push(Continuation { step, depth: depth + 1 });
                    }
                    // depth-first: the first successor is popped next
                    work.extend(scheduled.into_iter().rev());
                }
            }
        }
        outcome
    }

    fn advance<'t>(&self, step: Step<'t>) -> Advance<'t> {
        match step {
            Step::Dead { path, problem } => Advance::Settled {
                path,
                problem: Some(problem),
            },
            Step::Setter { node, path, setter } => self.advance_setter(node, path, &setter),
            Step::Getter { scope, scope_path, expr } => self.advance_getter(scope, scope_path, &expr),
            Step::PortMember { node, path, member } => {
                let source = self
                    .registry
                    .get(&node.class_name)
                    .and_then(|facts| facts.port_member_source(&self.config.registration_method, &member));
                let Some(value) = source else {
                    return Advance::Settled { path, problem: None };
                };
                if let Some(handed) = handed_out(node, &path, value) {
                    return Advance::Settled {
                        path: handed,
                        problem: None,
                    };
                }
                if naming::parse_getter_call(value).is_none() {
                    return Advance::Settled {
                        problem: Some(format!("cannot follow `{member}` assigned from `{value}`")),
                        path,
                    };
                }
                Advance::Next {
                    at: path.clone(),
                    successors: vec![(Step::getter(node, &path, value), None)],
                }
            }
        }
    }

    fn advance_setter<'t>(&self, node: &'t ComponentNode, path: String, setter: &str) -> Advance<'t> {
        let forwards = self
            .registry
            .get(&node.class_name)
            .map(|facts| facts.setter_forwards(setter))
            .unwrap_or_default();
        if forwards.is_empty() {
            return Advance::Settled { path, problem: None };
        }

        let successors = forwards
            .into_iter()
            .map(|(child, child_setter)| {
                let child_path = join_path(&path, child);
                let hop = Hop {
                    path: child_path.clone(),
                    interface: naming::interface_name(child_setter)
                        .unwrap_or(UNKNOWN_INTERFACE)
                        .to_string(),
                };
                let step = match node.child(child) {
                    Some(child_node) => Step::Setter {
                        node: child_node,
                        path: child_path,
                        setter: child_setter.to_string(),
                    },
                    None => Step::Dead {
                        problem: format!("forwarding target `{child}` is not a member of `{}`", node.class_name),
                        path: child_path,
                    },
                };
                (step, Some(hop))
            })
            .collect();
        Advance::Next { at: path, successors }
    }

    fn advance_getter<'t>(&self, scope: &'t ComponentNode, scope_path: String, expr: &str) -> Advance<'t> {
        let Some((object, getter)) = naming::parse_getter_call(expr) else {
            return Advance::Settled {
                path: join_path(&scope_path, &naming::member_path(expr)),
                problem: None,
            };
        };
        let object_path = join_path(&scope_path, object);
        let Some(node) = scope.child(object) else {
            return Advance::Settled {
                problem: Some(format!("`{object}` is not a member of `{}`", scope.class_name)),
                path: object_path,
            };
        };

        let returned = self
            .registry
            .get(&node.class_name)
            .and_then(|facts| facts.method(getter))
            .and_then(MethodFacts::return_expression);
        let Some(returned) = returned else {
            return Advance::Settled {
                path: object_path,
                problem: None,
            };
        };
        if let Some(handed) = handed_out(node, &object_path, returned) {
            return Advance::Settled {
                path: handed,
                problem: None,
            };
        }

        let next = match naming::classify(returned) {
            Identifier::Port(_) => Step::port_member(node, &object_path, returned),
            _ => Step::getter(node, &object_path, returned),
        };
        Advance::Next {
            at: object_path,
            successors: vec![(next, None)],
        }
    }
}

/// Component named by `this` or `&Member` evaluated inside `node` at `path`.
fn handed_out(node: &ComponentNode, path: &str, expr: &str) -> Option<String> {
    if expr == "this" {
        return Some(path.to_string());
    }
    let member = expr.trim_start_matches('&');
    node.child(member).map(|_| join_path(path, member))
}
