mod components;
pub mod naming;

pub use components::{
    join_path, split_path, AnalysisExport, ClassLocation, ComponentNode, ResolvedEdge, ROOT_NAME,
};
pub use naming::{MethodKind, UNKNOWN_INTERFACE};

use std::fmt;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};

/// Statement category as reported by the syntax tree, before any naming
/// convention is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Expression,
    Declaration,
    Return,
    Other,
}

/// A top-level statement of a method body with whitespace normalised.
///
/// For `Return` statements `text` holds only the returned expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStatement {
    pub kind: StatementKind,
    pub text: String,
}

/// Typed view of a method-body statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// `[object.]SetIts…Port…(argument)`
    SetterCall {
        object: Option<String>,
        setter: String,
        argument: String,
    },
    /// `Ifc* variable = Obj.GetIts…Port…();`
    GetterBinding { variable: String, getter: String },
    /// `target = value;`
    Assignment { target: String, value: String },
    Return(String),
    Other(String),
}

/// `OUT_PORT(Role, Ifc)->Method(...)` inside a method body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayCall {
    pub role: String,
    pub interface: String,
    pub method: String,
}

impl RelayCall {
    /// Port member the macro dereferences.
    pub fn port_member(&self) -> String {
        format!("Its{}{}", self.role, self.interface)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentMember {
    pub name: String,
    pub class_name: String,
}

#[derive(Clone, Debug)]
pub struct MethodFacts {
    pub name: String,
    pub qualified_name: String,
    pub kind: MethodKind,
    pub statements: Vec<Statement>,
    pub relays: Vec<RelayCall>,
}

impl MethodFacts {
    /// First top-level `return` expression, if any.
    pub fn return_expression(&self) -> Option<&str> {
        self.statements.iter().find_map(|statement| match statement {
            Statement::Return(expr) => Some(expr.as_str()),
            _ => None,
        })
    }
}

/// Everything the analysis knows about one class.
#[derive(Clone, Debug)]
pub struct ClassFacts {
    pub name: String,
    pub header_path: Option<PathBuf>,
    pub impl_path: Option<PathBuf>,
    pub base_types: IndexSet<String>,
    pub component_members: Vec<ComponentMember>,
    pub port_members: Vec<String>,
    pub methods: IndexMap<String, MethodFacts>,
}

impl ClassFacts {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header_path: None,
            impl_path: None,
            base_types: IndexSet::new(),
            component_members: Vec::new(),
            port_members: Vec::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn has_implementation(&self) -> bool {
        self.impl_path.is_some()
    }

    pub fn method(&self, name: &str) -> Option<&MethodFacts> {
        self.methods.get(name)
    }

    /// Calls of the form `child.setIts…Port…(param)` made inside the setter
    /// named `setter`, as `(child, child_setter)` pairs in source order.
    pub fn setter_forwards(&self, setter: &str) -> Vec<(&str, &str)> {
        let Some(method) = self
            .methods
            .values()
            .find(|method| naming::same_setter(&method.name, setter))
        else {
            return Vec::new();
        };
        method
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::SetterCall {
                    object: Some(child),
                    setter: child_setter,
                    argument,
                } if naming::is_identifier(argument) => Some((child.as_str(), child_setter.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Right-hand side assigned to port member `member` in the registration
    /// method. Null-pointer resets are skipped.
    pub fn port_member_source(&self, registration: &str, member: &str) -> Option<&str> {
        self.method(registration)?
            .statements
            .iter()
            .find_map(|statement| match statement {
                Statement::Assignment { target, value } if target == member && !naming::is_null_pointer(value) => {
                    Some(value.as_str())
                }
                _ => None,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable problem attached to a file, class or connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.subject, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, statements: Vec<Statement>) -> MethodFacts {
        MethodFacts {
            name: name.to_string(),
            qualified_name: format!("EgiMgrCls::{name}"),
            kind: naming::classify_method(name),
            statements,
            relays: Vec::new(),
        }
    }

    #[test]
    fn forwards_match_setters_case_insensitively() {
        let mut facts = ClassFacts::new("EgiMgrCls");
        facts.methods.insert(
            "SetItsDataOutPortEgiExtDataIfc".to_string(),
            method(
                "SetItsDataOutPortEgiExtDataIfc",
                vec![
                    Statement::Assignment {
                        target: "ItsDataOutPortEgiExtDataIfc".to_string(),
                        value: "ifc".to_string(),
                    },
                    Statement::SetterCall {
                        object: Some("EgiLruMgr".to_string()),
                        setter: "setItsDataOutPortEgiExtDataIfc".to_string(),
                        argument: "ifc".to_string(),
                    },
                    Statement::SetterCall {
                        object: Some("EgiCmp".to_string()),
                        setter: "SetItsDataOutPortEgiExtDataIfc".to_string(),
                        argument: "Other.GetItsXPortY()".to_string(),
                    },
                ],
            ),
        );

        assert_eq!(
            facts.setter_forwards("setitsdataoutportegiextdataifc"),
            vec![("EgiLruMgr", "setItsDataOutPortEgiExtDataIfc")]
        );
        assert!(facts.setter_forwards("SetItsOtherPortX").is_empty());
    }

    #[test]
    fn port_member_source_reads_the_registration_method() {
        let mut facts = ClassFacts::new("RadaltMgrCls");
        facts.methods.insert(
            "InitRelations".to_string(),
            method(
                "InitRelations",
                vec![Statement::Assignment {
                    target: "ItsItsRadaltEgiInPortEgiExtDataIfc".to_string(),
                    value: "RadaltLruMgr.GetItsRadaltEgiInPortEgiExtDataIfc()".to_string(),
                }],
            ),
        );

        assert_eq!(
            facts.port_member_source("InitRelations", "ItsItsRadaltEgiInPortEgiExtDataIfc"),
            Some("RadaltLruMgr.GetItsRadaltEgiInPortEgiExtDataIfc()")
        );
        assert_eq!(facts.port_member_source("Init", "ItsItsRadaltEgiInPortEgiExtDataIfc"), None);
    }

    #[test]
    fn null_resets_are_not_port_member_sources() {
        let mut facts = ClassFacts::new("RadaltMgrCls");
        let assign = |value: &str| Statement::Assignment {
            target: "ItsItsRadaltEgiInPortEgiExtDataIfc".to_string(),
            value: value.to_string(),
        };
        facts.methods.insert(
            "InitRelations".to_string(),
            method(
                "InitRelations",
                vec![assign("nullptr"), assign("NULL"), assign("&RadaltLruMgr")],
            ),
        );
        assert_eq!(
            facts.port_member_source("InitRelations", "ItsItsRadaltEgiInPortEgiExtDataIfc"),
            Some("&RadaltLruMgr")
        );

        facts.methods.insert("InitRelations".to_string(), method("InitRelations", vec![assign("nullptr")]));
        assert_eq!(facts.port_member_source("InitRelations", "ItsItsRadaltEgiInPortEgiExtDataIfc"), None);
    }

    #[test]
    fn return_expression_is_the_first_return() {
        let getter = method(
            "GetItsRadaltEgiInPortEgiExtDataIfc",
            vec![
                Statement::Other("Trace()".to_string()),
                Statement::Return("this".to_string()),
                Statement::Return("nullptr".to_string()),
            ],
        );
        assert_eq!(getter.return_expression(), Some("this"));
    }

    #[test]
    fn relay_names_its_port_member() {
        let relay = RelayCall {
            role: "DataOutPort".to_string(),
            interface: "EgiExtDataIfc".to_string(),
            method: "SetEgiExtData".to_string(),
        };
        assert_eq!(relay.port_member(), "ItsDataOutPortEgiExtDataIfc");
    }
}
