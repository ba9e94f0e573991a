use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser, Tree};

use crate::models::{RelayCall, SourceStatement, StatementKind};

static RELAY_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"OUT_PORT\(\s*(\w+)\s*,\s*(\w+)\s*\)\s*->\s*(\w+)\s*\(")
        .expect("relay pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to load the C++ grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("Parser produced no syntax tree for {0}")]
    NoTree(String),
}

/// A field declared directly in a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    /// Last `::` segment of the declared type.
    pub type_name: String,
    /// Declared through a pointer or reference declarator.
    pub is_pointer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDeclaration {
    pub name: String,
    pub base_types: Vec<String>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub qualified_name: String,
    pub name: String,
    pub statements: Vec<SourceStatement>,
    pub relays: Vec<RelayCall>,
}

impl MethodBody {
    /// Class qualifier of an out-of-line definition (`EgiMgrCls` for
    /// `EgiMgrCls::InitRelations`).
    pub fn owner(&self) -> Option<&str> {
        let (qualifier, _) = self.qualified_name.rsplit_once("::")?;
        Some(last_segment(qualifier))
    }
}

/// Extracts structural facts from C++ source text.
pub struct SourceDecoder {
    parser: Parser,
}

impl SourceDecoder {
    pub fn new() -> Result<Self, DecodeError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_cpp::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    fn parse(&mut self, label: &str, source: &str) -> Result<Tree, DecodeError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| DecodeError::NoTree(label.to_string()))?;
        if tree.root_node().has_error() {
            warn!(unit = label, "syntax errors in source unit, extracting what parses");
        }
        Ok(tree)
    }

    /// First class with a body declared in a header. Class specifiers win
    /// over struct specifiers.
    pub fn parse_class(&mut self, label: &str, source: &str) -> Result<Option<ClassDeclaration>, DecodeError> {
        let tree = self.parse(label, source)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let Some(class) = find_type_definition(root, "class_specifier")
            .or_else(|| find_type_definition(root, "struct_specifier"))
        else {
            debug!(unit = label, "no class definition found");
            return Ok(None);
        };
        let Some(name_node) = class.child_by_field_name("name") else {
            return Ok(None);
        };

        let mut declaration = ClassDeclaration {
            name: last_segment(text(name_node, bytes)).to_string(),
            base_types: Vec::new(),
            fields: Vec::new(),
        };
        let mut cursor = class.walk();
        for child in class.named_children(&mut cursor) {
            match child.kind() {
                "base_class_clause" => collect_base_types(child, bytes, &mut declaration.base_types),
                "field_declaration_list" => collect_fields(child, bytes, &mut declaration.fields),
                _ => {}
            }
        }
        debug!(
            unit = label,
            class = %declaration.name,
            fields = declaration.fields.len(),
            "parsed class declaration"
        );
        Ok(Some(declaration))
    }

    /// Every function definition in an implementation unit.
    pub fn parse_methods(&mut self, label: &str, source: &str) -> Result<Vec<MethodBody>, DecodeError> {
        let tree = self.parse(label, source)?;
        let bytes = source.as_bytes();

        let mut functions = Vec::new();
        collect_functions(tree.root_node(), &mut functions);
        let methods: Vec<MethodBody> = functions
            .into_iter()
            .filter_map(|function| method_body(function, bytes))
            .collect();
        debug!(unit = label, methods = methods.len(), "parsed method bodies");
        Ok(methods)
    }
}

fn text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or_default()
}

/// Last `::` segment of a possibly qualified name, ignoring template arguments.
pub fn last_segment(name: &str) -> &str {
    let head_end = name.find('<').unwrap_or(name.len());
    match name[..head_end].rfind("::") {
        Some(idx) => &name[idx + 2..],
        None => name,
    }
}

/// Collapses whitespace, keeping a single space only where it separates two
/// identifier characters, and drops a trailing `;`.
pub fn normalize(source: &str) -> String {
    fn is_word(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    let mut out = String::with_capacity(source.len());
    let mut pending_space = false;
    for ch in source.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && out.chars().last().is_some_and(is_word) && is_word(ch) {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out.trim_end_matches(';').to_string()
}

fn find_type_definition<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if node.kind() == kind && node.child_by_field_name("body").is_some() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "function_definition" {
            continue;
        }
        if let Some(found) = find_type_definition(child, kind) {
            return Some(found);
        }
    }
    None
}

fn collect_base_types(clause: Node, source: &[u8], out: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        if matches!(child.kind(), "type_identifier" | "qualified_identifier" | "template_type") {
            out.push(text(child, source).to_string());
        }
    }
}

fn collect_fields(list: Node, source: &[u8], out: &mut Vec<FieldDecl>) {
    let mut cursor = list.walk();
    for child in list.named_children(&mut cursor) {
        match child.kind() {
            "field_declaration" => field_declarations(child, source, out),
            kind if kind.starts_with("preproc_") => collect_fields(child, source, out),
            _ => {}
        }
    }
}

fn field_declarations(node: Node, source: &[u8], out: &mut Vec<FieldDecl>) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let type_name = last_segment(text(type_node, source)).to_string();
    let mut cursor = node.walk();
    for declarator in node.children_by_field_name("declarator", &mut cursor) {
        if let Some((name, is_pointer)) = declarator_name(declarator, source) {
            out.push(FieldDecl {
                name,
                type_name: type_name.clone(),
                is_pointer,
            });
        }
    }
}

fn last_named_child(node: Node) -> Option<Node> {
    node.named_child(node.named_child_count().checked_sub(1)?)
}

/// Name behind a field declarator. Function declarators yield nothing.
fn declarator_name(node: Node, source: &[u8]) -> Option<(String, bool)> {
    let mut current = node;
    let mut indirect = false;
    loop {
        match current.kind() {
            "field_identifier" | "identifier" => return Some((text(current, source).to_string(), indirect)),
            "pointer_declarator" | "reference_declarator" => {
                indirect = true;
                let next = current
                    .child_by_field_name("declarator")
                    .or_else(|| last_named_child(current));
                current = next?;
            }
            "array_declarator" | "init_declarator" => current = current.child_by_field_name("declarator")?,
            _ => return None,
        }
    }
}

fn collect_functions<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "function_definition" {
            out.push(child);
        } else {
            collect_functions(child, out);
        }
    }
}

fn find_function_declarator(node: Node) -> Option<Node> {
    match node.kind() {
        "function_declarator" => Some(node),
        "pointer_declarator" | "reference_declarator" => {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            children.into_iter().find_map(find_function_declarator)
        }
        _ => None,
    }
}

fn method_body(function: Node, source: &[u8]) -> Option<MethodBody> {
    let declarator = find_function_declarator(function.child_by_field_name("declarator")?)?;
    let qualified_name = text(declarator.child_by_field_name("declarator")?, source).to_string();
    let name = qualified_name
        .rsplit("::")
        .next()
        .unwrap_or(&qualified_name)
        .to_string();
    let body = function.child_by_field_name("body")?;

    let mut cursor = body.walk();
    let statements = body
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| source_statement(child, source))
        .collect();
    let relays = RELAY_CALL
        .captures_iter(text(body, source))
        .map(|captures| RelayCall {
            role: captures[1].to_string(),
            interface: captures[2].to_string(),
            method: captures[3].to_string(),
        })
        .collect();

    Some(MethodBody {
        qualified_name,
        name,
        statements,
        relays,
    })
}

fn source_statement(node: Node, source: &[u8]) -> SourceStatement {
    let normalized = normalize(text(node, source));
    match node.kind() {
        "expression_statement" => SourceStatement {
            kind: StatementKind::Expression,
            text: normalized,
        },
        "declaration" => SourceStatement {
            kind: StatementKind::Declaration,
            text: normalized,
        },
        "return_statement" => SourceStatement {
            kind: StatementKind::Return,
            text: normalized
                .strip_prefix("return")
                .unwrap_or(&normalized)
                .trim()
                .to_string(),
        },
        _ => SourceStatement {
            kind: StatementKind::Other,
            text: normalized,
        },
    }
}
