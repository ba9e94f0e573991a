//! Plain-text reports printed by the CLI.

use crate::core::constructor::{ClassPlan, FlatWiringPlan};
use crate::core::resolver::Resolution;
use crate::models::{ComponentNode, ResolvedEdge};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// The component hierarchy as an indented tree.
pub fn render_tree(root: &ComponentNode) -> Vec<String> {
    let mut lines = vec![format!("  {}", root.class_name)];
    push_children(root, "", &mut lines);
    lines
}

fn push_children(node: &ComponentNode, indent: &str, lines: &mut Vec<String>) {
    let count = node.children.len();
    for (index, child) in node.children.iter().enumerate() {
        let last = index + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        lines.push(format!("  {indent}{connector}{}: {}", child.name, child.class_name));
        let nested = format!("{indent}{}", if last { "    " } else { "│   " });
        push_children(child, &nested, lines);
    }
}

fn endpoint<'a>(path: &'a str, root_class: &'a str) -> &'a str {
    if path.is_empty() {
        root_class
    } else {
        path
    }
}

fn render_edge(edge: &ResolvedEdge, root_class: &str) -> String {
    let origin = endpoint(&edge.origin_path, root_class);
    if edge.unresolved {
        format!("    {origin} --> ??? (unresolved: {})", edge.destination_path)
    } else {
        format!("    {origin} --> {}", endpoint(&edge.destination_path, root_class))
    }
}

/// Full `analyze` report: hierarchy, connections grouped by interface and a
/// legend.
pub fn render_report(root_class: &str, tree: &ComponentNode, resolution: &Resolution) -> String {
    let title = format!("Partition: {root_class}");
    let mut lines = vec![title.clone(), "=".repeat(title.chars().count()), String::new()];

    lines.push("Component Hierarchy:".to_string());
    lines.extend(render_tree(tree));
    lines.push(String::new());

    lines.push("Port Connections (grouped by interface):".to_string());
    let groups = resolution.by_interface();
    if groups.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (interface, edges) in groups {
        lines.push(String::new());
        lines.push(format!("  [{interface}]"));
        lines.extend(edges.into_iter().map(|edge| render_edge(edge, root_class)));
    }
    lines.push(String::new());

    lines.push("Legend:".to_string());
    lines.push("  A --> B  means A sends data to B via the interface in brackets".to_string());
    lines.join("\n")
}

fn render_class_preview(class: &ClassPlan, plan: &FlatWiringPlan) -> Vec<String> {
    let mut lines = vec![String::new(), rule(), format!("CLASS: {}", class.class_name), rule()];

    if !class.ports.is_empty() {
        lines.push("\n--- Port members (private) ---".to_string());
        lines.extend(class.ports.iter().map(|port| format!("    {}", port.member_declaration())));
        lines.push("\n--- Port setters (public) ---".to_string());
        lines.extend(class.ports.iter().map(|port| format!("    {}", port.setter_declaration())));
    }
    if !class.accessors.is_empty() {
        lines.push("\n--- Component accessors (public) ---".to_string());
        lines.extend(class.accessors.iter().map(|accessor| format!("    {}", accessor.declaration())));
    }
    if !class.ports.is_empty() {
        lines.push("\n--- Setter implementations ---".to_string());
        lines.extend(class.ports.iter().map(|port| port.setter_definition(&class.class_name)));
    }
    if !class.accessors.is_empty() {
        lines.push("\n--- Accessor implementations ---".to_string());
        lines.extend(
            class
                .accessors
                .iter()
                .map(|accessor| accessor.definition(&class.class_name)),
        );
    }

    let statements: Vec<String> = plan
        .statements_for(&class.class_name)
        .map(|statement| statement.render().trim_end().to_string())
        .collect();
    if !statements.is_empty() {
        lines.push("\n--- Wiring statements ---".to_string());
        lines.extend(statements);
    }
    lines
}

/// Dry-run preview of every class the plan would touch.
pub fn render_preview(plan: &FlatWiringPlan) -> String {
    let mut lines = vec![rule(), "DRY RUN - Preview of changes".to_string(), rule()];
    for class in plan.pending_classes() {
        lines.extend(render_class_preview(class, plan));
    }
    lines.push(String::new());
    lines.push(rule());
    lines.push("Run with --apply to modify files".to_string());
    lines.push(rule());
    lines.join("\n")
}
