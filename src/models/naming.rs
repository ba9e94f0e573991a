//! Naming-convention classifier.
//!
//! The analysed sources carry their semantics in identifiers: a field called
//! `ItsDataOutPortEgiExtDataIfc` is an output port for `EgiExtDataIfc`, a
//! method called `GetItsRadaltEgiInPortEgiExtDataIfc` hands out a consumer for
//! the same interface. Everything that depends on those conventions is decided
//! here, once, and handed to the rest of the crate as typed values.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{SourceStatement, Statement, StatementKind};

const PORT_TOKEN: &str = "Port";
const PORT_FIELD_PREFIX: &str = "Its";

/// Interface used when an identifier carries no `Port` token.
pub const UNKNOWN_INTERFACE: &str = "Unknown";

static SETTER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z_]\w*)\.)?([sS]et[Ii]ts\w*[Pp]ort\w*)\((.*)\)$")
        .expect("setter call pattern is valid")
});

static GETTER_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_]\w*)=([A-Za-z_]\w*\.GetIts\w*Port\w*\(\))$")
        .expect("getter binding pattern is valid")
});

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)=([^=].*)$").expect("assignment pattern is valid")
});

static GETTER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\.(GetIts\w*Port\w*)\(\)$").expect("getter call pattern is valid")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("identifier pattern is valid"));

/// Role and interface embedded in a port-style identifier.
///
/// For `SetItsDataOutPortEgiExtDataIfc` the role is `DataOut` and the
/// interface is `EgiExtDataIfc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortName<'a> {
    pub role: &'a str,
    pub interface: &'a str,
}

/// What an identifier means under the port naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier<'a> {
    /// `Its{Role}Port{Interface}` member field.
    Port(PortName<'a>),
    /// `SetIts{Role}Port{Interface}` injection method.
    Setter(PortName<'a>),
    /// `GetIts{Role}Port{Interface}` accessor, called without arguments.
    Getter(PortName<'a>),
    Other,
}

/// Classification of a field declared in a class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Port,
    Component,
    Plain,
}

/// Classification of a method defined in an implementation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Setter,
    Getter,
    /// `Set…` interface entry point that receives data rather than a port.
    Receiver,
    Other,
}

pub fn classify(ident: &str) -> Identifier<'_> {
    let ident = strip_call(ident);
    if let Some(rest) = ident.strip_prefix("SetIts") {
        return port_name(rest).map_or(Identifier::Other, Identifier::Setter);
    }
    if let Some(rest) = ident.strip_prefix("GetIts") {
        return port_name(rest).map_or(Identifier::Other, Identifier::Getter);
    }
    if let Some(rest) = ident.strip_prefix(PORT_FIELD_PREFIX) {
        return port_name(rest).map_or(Identifier::Other, Identifier::Port);
    }
    Identifier::Other
}

fn port_name(rest: &str) -> Option<PortName<'_>> {
    let idx = rest.rfind(PORT_TOKEN)?;
    Some(PortName {
        role: &rest[..idx],
        interface: &rest[idx + PORT_TOKEN.len()..],
    })
}

fn strip_call(ident: &str) -> &str {
    ident.trim_end_matches(|c| c == '(' || c == ')')
}

/// Interface carried by a port, setter or getter identifier: everything after
/// the last `Port`, without trailing call parentheses.
pub fn interface_name(ident: &str) -> Option<&str> {
    let idx = ident.rfind(PORT_TOKEN)?;
    let interface = strip_call(&ident[idx + PORT_TOKEN.len()..]);
    (!interface.is_empty()).then_some(interface)
}

/// Setter comparison for forwarding chains, ignoring ASCII case
/// (`setIts…` forwards to `SetIts…`).
pub fn same_setter(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub fn classify_field(name: &str, type_name: &str, indirect: bool, component_suffix: &str) -> FieldRole {
    if name.starts_with(PORT_FIELD_PREFIX) && name.contains(PORT_TOKEN) {
        FieldRole::Port
    } else if !indirect && type_name.ends_with(component_suffix) {
        FieldRole::Component
    } else {
        FieldRole::Plain
    }
}

pub fn classify_method(name: &str) -> MethodKind {
    let lowered = name.to_ascii_lowercase();
    if lowered.starts_with("setits") && lowered.contains("port") {
        MethodKind::Setter
    } else if name.starts_with("GetIts") && name.contains(PORT_TOKEN) {
        MethodKind::Getter
    } else if name.starts_with("Set") {
        MethodKind::Receiver
    } else {
        MethodKind::Other
    }
}

/// Splits `Obj.GetIts…Port…()` into the object and the getter name.
pub fn parse_getter_call(expr: &str) -> Option<(&str, &str)> {
    let captures = GETTER_CALL.captures(expr)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// `nullptr`, `NULL` or a literal `0`.
pub fn is_null_pointer(expr: &str) -> bool {
    matches!(expr, "nullptr" | "NULL" | "0")
}

/// Member path named by an accessor expression.
///
/// `RadaltMgr.GetItsRadaltEgiInPortEgiExtDataIfc()` names `RadaltMgr`,
/// `EgiMgr.GetEgiLruMgr().GetItsXPortY()` names `EgiMgr.EgiLruMgr`.
pub fn member_path(expr: &str) -> String {
    let segments: Vec<&str> = expr.split('.').collect();
    let mut parts = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let is_last = index + 1 == segments.len();
        if let Some(call) = segment.strip_suffix("()") {
            if !is_last {
                if let Some(member) = call.strip_prefix("Get") {
                    parts.push(member);
                }
            }
        } else if !segment.is_empty() && !segment.starts_with("Get") && !segment.starts_with("Set") {
            parts.push(segment);
        }
    }
    if parts.is_empty() {
        expr.to_string()
    } else {
        parts.join(".")
    }
}

/// Types a whitespace-normalised statement.
pub fn classify_statement(statement: &SourceStatement) -> Statement {
    let text = statement.text.as_str();
    match statement.kind {
        StatementKind::Return => Statement::Return(text.to_string()),
        StatementKind::Declaration => match GETTER_BINDING.captures(text) {
            Some(captures) => Statement::GetterBinding {
                variable: captures[1].to_string(),
                getter: captures[2].to_string(),
            },
            None => Statement::Other(text.to_string()),
        },
        StatementKind::Expression => {
            if let Some(captures) = SETTER_CALL.captures(text) {
                return Statement::SetterCall {
                    object: captures.get(1).map(|m| m.as_str().to_string()),
                    setter: captures[2].to_string(),
                    argument: captures[3].to_string(),
                };
            }
            if let Some(captures) = ASSIGNMENT.captures(text) {
                return Statement::Assignment {
                    target: captures[1].to_string(),
                    value: captures[2].to_string(),
                };
            }
            Statement::Other(text.to_string())
        }
        StatementKind::Other => Statement::Other(text.to_string()),
    }
}
