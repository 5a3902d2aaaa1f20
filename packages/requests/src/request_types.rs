//! Registry of known request types, loaded from embedded TOML.
//!
//! `request_types.toml` is baked into the binary at compile time via
//! [`include_str!`]. Adding a request type is a matter of adding a table
//! to that file.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;

use crate::RequestsError;

const REQUEST_TYPES_TOML: &str = include_str!("../request_types.toml");

/// Widest the definition column of [`request_types_table`] gets before
/// wrapping.
const MAX_DEFINITION_WIDTH: usize = 40;

/// One entry of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestType {
    /// Open311 service code sent as the `service_code` filter.
    pub service_code: String,
    /// Human-readable description.
    pub service_name: String,
}

#[derive(Deserialize)]
struct RegistryFile {
    types: BTreeMap<String, RequestType>,
}

/// Returns every known request type keyed by its command-line name.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (this is a compile-time
/// guarantee since the file is embedded).
#[must_use]
pub fn all_request_types() -> BTreeMap<String, RequestType> {
    toml::from_str::<RegistryFile>(REQUEST_TYPES_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse request_types.toml: {e}"))
        .types
}

/// Maps request type names to their service codes, in the order given.
///
/// # Errors
///
/// Returns [`RequestsError::UnknownRequestType`] for the first name not in
/// the registry.
pub fn resolve_request_types(names: &[String]) -> Result<Vec<String>, RequestsError> {
    let registry = all_request_types();

    names
        .iter()
        .map(|name| {
            registry
                .get(name)
                .map(|t| t.service_code.clone())
                .ok_or_else(|| RequestsError::UnknownRequestType { name: name.clone() })
        })
        .collect()
}

/// Renders the registry as a two-column `type` / `definition` table.
#[must_use]
pub fn request_types_table() -> String {
    let registry = all_request_types();
    let name_width = registry
        .keys()
        .map(String::len)
        .chain(std::iter::once("type".len()))
        .max()
        .unwrap_or(0);

    let mut table = String::new();
    let _ = writeln!(table, "{:<name_width$}  definition", "type");
    let _ = writeln!(
        table,
        "{}  {}",
        "-".repeat(name_width),
        "-".repeat(MAX_DEFINITION_WIDTH)
    );

    for (name, request_type) in &registry {
        for (i, line) in wrap(&request_type.service_name, MAX_DEFINITION_WIDTH)
            .iter()
            .enumerate()
        {
            let label = if i == 0 { name.as_str() } else { "" };
            let _ = writeln!(table, "{label:<name_width$}  {line}");
        }
    }

    table
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}
