//! Tolerant decoding of schemaless index metadata.
//!
//! The metadata store behind the index is schemaless: the same field may
//! arrive as a native JSON list, as a string holding encoded JSON, or as a
//! list whose items are themselves encoded JSON strings. Every field is first
//! classified into a [`MetadataField`] and then decoded with exhaustive case
//! handling. A field that cannot be decoded becomes empty; it never fails
//! the surrounding retrieval.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

use crate::index::IndexRecord;
use crate::models::{split_table_id, ColumnSpec, TableContext, DEFAULT_COLUMN_TYPE};

/// The shapes a metadata field can legally take.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataField {
    /// Field absent or JSON `null`.
    Missing,
    /// A native JSON array.
    List(Vec<Value>),
    /// A string that should hold encoded JSON.
    Encoded(String),
    /// Anything else (number, bool, object). Not decodable as a list.
    Scalar(Value),
}

impl MetadataField {
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => MetadataField::Missing,
            Some(Value::Array(items)) => MetadataField::List(items.clone()),
            Some(Value::String(s)) => MetadataField::Encoded(s.clone()),
            Some(other) => MetadataField::Scalar(other.clone()),
        }
    }

    /// Resolve the field to its list of items. `Encoded` is decoded one level;
    /// an encoded value that is not a JSON array yields `None`.
    fn into_items(self) -> Option<Vec<Value>> {
        match self {
            MetadataField::Missing => Some(Vec::new()),
            MetadataField::List(items) => Some(items),
            MetadataField::Encoded(s) => {
                if s.trim().is_empty() {
                    return Some(Vec::new());
                }
                match serde_json::from_str::<Value>(&s) {
                    Ok(Value::Array(items)) => Some(items),
                    Ok(Value::Null) => Some(Vec::new()),
                    _ => None,
                }
            }
            MetadataField::Scalar(_) => None,
        }
    }
}

/// Decode a `columns` field into column specs.
///
/// Items may be objects (`{"name": .., "type": ..}`), JSON-encoded objects,
/// or plain column names (typed as [`DEFAULT_COLUMN_TYPE`]). Duplicate names
/// (case-insensitive) keep their first occurrence.
pub fn decode_columns(value: Option<&Value>) -> Vec<ColumnSpec> {
    let items = match MetadataField::classify(value).into_items() {
        Some(items) => items,
        None => {
            warn!("malformed columns metadata; treating as empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(items.len());

    for item in items {
        let column = match item {
            Value::Object(map) => column_from_object(&map),
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => column_from_object(&map),
                _ if is_plain_identifier(&s) => Some(ColumnSpec::new(&s, DEFAULT_COLUMN_TYPE)),
                _ => None,
            },
            _ => None,
        };

        if let Some(column) = column {
            if seen.insert(column.name.to_lowercase()) {
                columns.push(column);
            }
        }
    }

    columns
}

fn column_from_object(map: &Map<String, Value>) -> Option<ColumnSpec> {
    let name = map.get("name").and_then(|v| v.as_str())?.trim();
    if name.is_empty() {
        return None;
    }

    let declared_type = ["type", "declared_type", "data_type"]
        .iter()
        .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_COLUMN_TYPE);

    let nullable = match map.get("nullable") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !matches!(s.to_ascii_lowercase().as_str(), "no" | "false"),
        _ => true,
    };

    Some(ColumnSpec {
        name: name.to_string(),
        declared_type: declared_type.to_string(),
        nullable,
    })
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Decode a string-list field (`tags`, `glossary_terms`).
///
/// Items that are themselves JSON-encoded arrays are flattened; other
/// strings are taken literally; non-string items are ignored.
pub fn decode_string_set(value: Option<&Value>) -> BTreeSet<String> {
    let items = match MetadataField::classify(value).into_items() {
        Some(items) => items,
        None => {
            warn!("malformed string-list metadata; treating as empty");
            return BTreeSet::new();
        }
    };

    let mut out = BTreeSet::new();
    for item in items {
        match item {
            Value::String(s) if s.trim_start().starts_with('[') => {
                if let Ok(Value::Array(inner)) = serde_json::from_str::<Value>(&s) {
                    out.extend(
                        inner
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(|v| v.trim().to_string())
                            .filter(|v| !v.is_empty()),
                    );
                } else {
                    out.insert(s.trim().to_string());
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.insert(s.to_string());
                }
            }
            _ => {}
        }
    }
    out
}

fn decode_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build a [`TableContext`] from an index record, normalizing every metadata
/// field. `schema` and `table` fall back to the parts of the record id.
pub fn context_from_record(record: &IndexRecord, relevance_score: f64) -> TableContext {
    let meta = record.metadata.as_object();
    let field = |key: &str| meta.and_then(|m| m.get(key));

    let (id_schema, id_table) = split_table_id(&record.id);

    TableContext {
        id: record.id.clone(),
        schema: decode_text(field("schema")).unwrap_or_else(|| id_schema.to_string()),
        table: decode_text(field("table")).unwrap_or_else(|| id_table.to_string()),
        columns: decode_columns(field("columns")),
        tags: decode_string_set(field("tags")),
        glossary_terms: decode_string_set(field("glossary_terms")),
        relevance_score,
        domain: decode_text(field("domain")).unwrap_or_default(),
        description: record.text.clone(),
    }
}
