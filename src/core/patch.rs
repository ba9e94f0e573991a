//! Minimal-footprint edits of C++ headers and implementation units.
//!
//! Every edit first checks whether its content is already present, so
//! applying the same plan twice leaves files byte-identical.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::constructor::{ClassPlan, WiringStatement};

pub const MECHANISM_BANNER: &str = "// === Generated flat port mechanism ===";
pub const WIRING_BANNER: &str = "// === Generated flat port wiring ===";

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Class `{class}` not found in {file}")]
    ClassNotFound { class: String, file: String },
    #[error("Unbalanced braces after `{what}` in {file}")]
    Unbalanced { what: String, file: String },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    fn keyword(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }
}

/// Byte offsets of a `{ ... }` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BraceSpan {
    pub open: usize,
    pub close: usize,
}

impl BraceSpan {
    pub fn inner<'t>(&self, text: &'t str) -> &'t str {
        &text[self.open + 1..self.close]
    }
}

/// Identifier byte. Every byte of a non-ASCII character counts, so UTF-8
/// identifiers are never split.
fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || !byte.is_ascii()
}

/// Visits every code byte in `start..end`, skipping comments and string or
/// character literals, together with the brace depth relative to `start`.
/// An opening brace is visited at the outer depth, a closing brace at the
/// depth it returns to.
fn scan_code<R>(text: &str, start: usize, end: usize, mut visit: impl FnMut(usize, usize) -> ControlFlow<R>) -> Option<R> {
    let bytes = text.as_bytes();
    let end = end.min(bytes.len());
    let mut depth = 0usize;
    let mut i = start;
    while i < end {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = text[i..].find('\n').map_or(end, |offset| i + offset);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..].find("*/").map_or(end, |offset| i + 2 + offset + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < end && bytes[i] != quote && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
                continue;
            }
            b'{' => {
                if let ControlFlow::Break(found) = visit(i, depth) {
                    return Some(found);
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if let ControlFlow::Break(found) = visit(i, depth) {
                    return Some(found);
                }
            }
            _ => {
                if let ControlFlow::Break(found) = visit(i, depth) {
                    return Some(found);
                }
            }
        }
        i += 1;
    }
    None
}

/// Offset of the `}` matching the `{` at `open`.
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let bytes = text.as_bytes();
    scan_code(text, open, text.len(), |i, depth| {
        if i > open && bytes[i] == b'}' && depth == 0 {
            ControlFlow::Break(i)
        } else {
            ControlFlow::Continue(())
        }
    })
}

/// Body of the first definition of `class_name` (forward declarations are
/// skipped).
pub fn locate_class(text: &str, class_name: &str, file: &str) -> Result<BraceSpan, PatchError> {
    let pattern = format!(r"\b(?:class|struct)\s+{}\b[^{{;]*\{{", regex::escape(class_name));
    let not_found = || PatchError::ClassNotFound {
        class: class_name.to_string(),
        file: file.to_string(),
    };
    let head = Regex::new(&pattern).map_err(|_| not_found())?;
    let found = head.find(text).ok_or_else(not_found)?;
    let open = found.end() - 1;
    let close = matching_brace(text, open).ok_or_else(|| PatchError::Unbalanced {
        what: class_name.to_string(),
        file: file.to_string(),
    })?;
    Ok(BraceSpan { open, close })
}

/// Body of the out-of-line definition `class_name::method(...)`, if present.
pub fn locate_method(text: &str, class_name: &str, method: &str) -> Option<BraceSpan> {
    let pattern = format!(
        r"\b{}::{}\s*\([^)]*\)\s*(?:const\s*)?\{{",
        regex::escape(class_name),
        regex::escape(method)
    );
    let found = Regex::new(&pattern).ok()?.find(text)?;
    let open = found.end() - 1;
    Some(BraceSpan {
        open,
        close: matching_brace(text, open)?,
    })
}

/// Offset just past the colon of the first depth-0 `access:` label in the
/// class body.
fn find_access_label(text: &str, class: BraceSpan, access: Access) -> Option<usize> {
    let keyword = access.keyword().as_bytes();
    let bytes = text.as_bytes();
    scan_code(text, class.open + 1, class.close, |i, depth| {
        if depth != 0 || !bytes[i..].starts_with(keyword) || (i > 0 && is_word_byte(bytes[i - 1])) {
            return ControlFlow::Continue(());
        }
        let mut colon = i + keyword.len();
        while matches!(bytes.get(colon), Some(b' ' | b'\t')) {
            colon += 1;
        }
        if bytes.get(colon) == Some(&b':') && bytes.get(colon + 1) != Some(&b':') {
            ControlFlow::Break(colon + 1)
        } else {
            ControlFlow::Continue(())
        }
    })
}

/// `haystack` contains `word` with no identifier character on either side.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before = start == 0 || !is_word_byte(bytes[start - 1]);
        let after = end >= bytes.len() || !is_word_byte(bytes[end]);
        before && after
    })
}

fn indented(lines: &[String]) -> String {
    lines.iter().map(|line| format!("    {line}\n")).collect()
}

/// Adds declarations to the public and private sections of a class. A
/// missing section is opened just before the closing brace.
pub fn insert_declarations(
    text: &str,
    class_name: &str,
    public: &[String],
    private: &[String],
    file: &str,
) -> Result<String, PatchError> {
    if public.is_empty() && private.is_empty() {
        return Ok(text.to_string());
    }
    let class = locate_class(text, class_name, file)?;

    let mut insertions: Vec<(usize, String)> = Vec::new();
    let mut tail = String::new();
    for (access, declarations) in [(Access::Public, public), (Access::Private, private)] {
        if declarations.is_empty() {
            continue;
        }
        match find_access_label(text, class, access) {
            Some(label_end) => {
                let line_end = text[label_end..]
                    .find('\n')
                    .map_or(text.len(), |offset| label_end + offset);
                let block = indented(declarations);
                insertions.push((line_end, format!("\n{}", block.trim_end_matches('\n'))));
            }
            None => {
                tail.push_str(access.keyword());
                tail.push_str(":\n");
                tail.push_str(&indented(declarations));
            }
        }
    }
    if !tail.is_empty() {
        if !text[..class.close].ends_with('\n') {
            tail.insert(0, '\n');
        }
        insertions.push((class.close, tail));
    }

    let mut patched = text.to_string();
    insertions.sort_by(|a, b| b.0.cmp(&a.0));
    for (position, content) in insertions {
        patched.insert_str(position, &content);
    }
    Ok(patched)
}

/// Header edits for one class: port members, port setters, accessors and,
/// when wiring is placed in this class, the registration method.
pub fn patch_header(text: &str, plan: &ClassPlan, registration: Option<&str>, file: &str) -> Result<String, PatchError> {
    let class = locate_class(text, &plan.class_name, file)?;
    let body = class.inner(text);

    let mut public = Vec::new();
    for port in &plan.ports {
        if !contains_word(body, &port.setter_name) {
            public.push(port.setter_declaration());
        }
    }
    for accessor in &plan.accessors {
        if !contains_word(body, &accessor.method_name) {
            public.push(accessor.declaration());
        }
    }
    if let Some(method) = registration {
        if !contains_word(body, method) {
            public.push(format!("void {method}();"));
        }
    }
    let private: Vec<String> = plan
        .ports
        .iter()
        .filter(|port| !contains_word(body, &port.member_name))
        .map(|port| port.member_declaration())
        .collect();

    insert_declarations(text, &plan.class_name, &public, &private, file)
}

/// Implementation edits for one class: setter and accessor definitions, and
/// wiring statements merged into (or creating) the registration method.
pub fn patch_source(
    text: &str,
    plan: &ClassPlan,
    statements: &[&WiringStatement],
    registration: &str,
) -> String {
    let class_name = &plan.class_name;
    let mut content = text.to_string();
    let mut additions = Vec::new();

    for port in &plan.ports {
        if !contains_word(&content, &format!("{class_name}::{}", port.setter_name)) {
            additions.push(port.setter_definition(class_name));
        }
    }
    for accessor in &plan.accessors {
        if !contains_word(&content, &format!("{class_name}::{}", accessor.method_name)) {
            additions.push(accessor.definition(class_name));
        }
    }

    if !statements.is_empty() {
        match locate_method(&content, class_name, registration) {
            Some(method) => {
                let existing: HashSet<&str> = method.inner(&content).lines().map(str::trim).collect();
                let has_banner = existing.contains(WIRING_BANNER);
                let missing: Vec<&WiringStatement> = statements
                    .iter()
                    .copied()
                    .filter(|statement| !existing.contains(statement.statement.as_str()))
                    .collect();
                if !missing.is_empty() {
                    let mut block = if has_banner {
                        String::new()
                    } else {
                        format!("\n    {WIRING_BANNER}\n")
                    };
                    for statement in &missing {
                        block.push_str(&statement.render());
                    }
                    debug!(class = %class_name, statements = missing.len(), "merging wiring statements");
                    content.insert_str(method.close, &block);
                }
            }
            None => {
                let mut definition = format!("void {class_name}::{registration}()\n{{\n    {WIRING_BANNER}\n");
                for statement in statements {
                    definition.push_str(&statement.render());
                }
                definition.push_str("}\n");
                additions.push(definition);
            }
        }
    }

    if !additions.is_empty() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
        content.push_str(MECHANISM_BANNER);
        content.push('\n');
        content.push_str(&additions.join("\n"));
    }
    content
}

/// Original and patched text of one file.
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub path: PathBuf,
    pub original: String,
    pub modified: String,
}

impl FilePatch {
    pub fn is_change(&self) -> bool {
        self.original != self.modified
    }

    /// Writes the patched text, keeping `<file>.bak` when `backup` is set.
    /// Unchanged files are left alone.
    pub fn write(&self, backup: bool) -> Result<bool, PatchError> {
        if !self.is_change() {
            return Ok(false);
        }
        if backup {
            let mut backup_path = self.path.clone().into_os_string();
            backup_path.push(".bak");
            let backup_path = PathBuf::from(backup_path);
            fs::write(&backup_path, &self.original).map_err(|source| PatchError::Io {
                path: backup_path.clone(),
                source,
            })?;
        }
        write_atomically(&self.path, &self.modified)?;
        info!(path = %self.path.display(), "patched file");
        Ok(true)
    }
}

/// Replaces `path` through a temporary file in the same directory.
pub fn write_atomically(path: &Path, contents: &str) -> Result<(), PatchError> {
    let io_error = |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(contents.as_bytes()).map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

fn read(path: &Path) -> Result<String, PatchError> {
    fs::read_to_string(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Computes the header and implementation patches for one class without
/// writing anything. A class that cannot be located fails as a whole.
pub fn patch_class(
    plan: &ClassPlan,
    statements: &[&WiringStatement],
    registration: &str,
) -> Result<Vec<FilePatch>, PatchError> {
    let mut patches = Vec::new();
    if let Some(header) = &plan.header_path {
        let original = read(header)?;
        let needs_registration = !statements.is_empty();
        let modified = patch_header(
            &original,
            plan,
            needs_registration.then_some(registration),
            &header.display().to_string(),
        )?;
        patches.push(FilePatch {
            path: header.clone(),
            original,
            modified,
        });
    }
    if let Some(source) = &plan.impl_path {
        let original = read(source)?;
        let modified = patch_source(&original, plan, statements, registration);
        patches.push(FilePatch {
            path: source.clone(),
            original,
            modified,
        });
    }
    Ok(patches)
}
