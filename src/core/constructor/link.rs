use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An output port added to a producer class: a raw interface pointer plus
/// the setter that fills it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PortPlan {
    /// Field name, e.g. `m_egiOut`.
    pub member_name: String,
    /// Setter name, e.g. `SetEgiOut`.
    pub setter_name: String,
    pub interface: String,
    /// Tree path of the consumer this port was allocated for.
    pub destination: String,
}

impl PortPlan {
    pub fn member_declaration(&self) -> String {
        format!("{}* {}{{nullptr}};", self.interface, self.member_name)
    }

    pub fn setter_declaration(&self) -> String {
        format!("void {}({}* port);", self.setter_name, self.interface)
    }

    pub fn setter_definition(&self, class_name: &str) -> String {
        format!(
            "void {class_name}::{}({}* port)\n{{\n    {} = port;\n}}\n",
            self.setter_name, self.interface, self.member_name
        )
    }
}

/// A by-reference accessor for one component member.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessorPlan {
    /// Accessor name, e.g. `GetEgiLruMgr`.
    pub method_name: String,
    pub member_name: String,
    pub return_type: String,
}

impl AccessorPlan {
    pub fn declaration(&self) -> String {
        format!("{}& {}();", self.return_type, self.method_name)
    }

    pub fn definition(&self, class_name: &str) -> String {
        format!(
            "{}& {class_name}::{}()\n{{\n    return {};\n}}\n",
            self.return_type, self.method_name, self.member_name
        )
    }
}

/// One generated wiring call, placed in the registration method of the
/// nearest common ancestor of producer and consumer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WiringStatement {
    pub parent_class: String,
    pub parent_path: String,
    pub statement: String,
    pub comment: String,
}

impl WiringStatement {
    pub fn new(
        parent_class: &str,
        parent_path: &str,
        origin_chain: &str,
        setter: &str,
        destination_chain: &str,
        comment: String,
    ) -> Self {
        let target = if destination_chain.is_empty() {
            "this".to_string()
        } else {
            format!("&{destination_chain}")
        };
        let statement = if origin_chain.is_empty() {
            format!("{setter}({target});")
        } else {
            format!("{origin_chain}.{setter}({target});")
        };
        Self {
            parent_class: parent_class.to_string(),
            parent_path: parent_path.to_string(),
            statement,
            comment,
        }
    }

    /// Comment line followed by the statement, both indented one level.
    pub fn render(&self) -> String {
        format!("    // {}\n    {}\n", self.comment, self.statement)
    }
}

/// Port base name for an interface: a configured alias, or the interface
/// stripped of `Ifc`, `ExtData` and `Control` in lowerCamel.
pub fn derive_port_name(interface: &str, aliases: &IndexMap<String, String>) -> String {
    if let Some(alias) = aliases.get(interface) {
        return alias.clone();
    }
    let stripped = interface
        .replace("Ifc", "")
        .replace("ExtData", "")
        .replace("Control", "");
    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => "port".to_string(),
    }
}

/// `Get` + member name without storage prefix and component suffix.
pub fn derive_accessor_name(member: &str, storage_prefixes: &[String], component_suffix: &str) -> String {
    let unprefixed = storage_prefixes
        .iter()
        .find_map(|prefix| member.strip_prefix(prefix.as_str()))
        .unwrap_or(member);
    let base = unprefixed.strip_suffix(component_suffix).unwrap_or(unprefixed);
    let base = if base.is_empty() { unprefixed } else { base };
    format!("Get{}", capitalize(base))
}

pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
