//! Core data models used throughout Query Harness.
//!
//! These types represent the schema facts that flow from retrieval into
//! the SQL correction pipeline. All of them are immutable once built: a
//! retrieval result owns its contexts for the lifetime of one request and
//! downstream stages only read them.

use serde::Serialize;
use std::collections::BTreeSet;

/// Reserved id prefix marking an indexed external document rather than a table.
pub const DOCUMENT_ID_PREFIX: &str = "doc:";

/// Declared type used when the metadata omits a column type.
pub const DEFAULT_COLUMN_TYPE: &str = "text";

/// One column of a retrieved table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, declared_type: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            nullable: true,
        }
    }
}

/// Retrieved schema/table metadata used to ground SQL correction.
///
/// `id` is `schema.table` for tables living in a named schema. Column names
/// are unique case-insensitively within a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableContext {
    pub id: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub tags: BTreeSet<String>,
    pub glossary_terms: BTreeSet<String>,
    /// Classifier confidence, or raw vector distance on the fallback path.
    pub relevance_score: f64,
    pub domain: String,
    /// Indexed descriptive text of the record.
    pub description: String,
}

impl TableContext {
    /// Build a context from an id and its columns, deriving schema and table
    /// from the id. Mostly useful for tests and for callers that already know
    /// the schema.
    pub fn new(id: &str, columns: Vec<ColumnSpec>) -> Self {
        let (schema, table) = split_table_id(id);
        Self {
            id: id.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
            tags: BTreeSet::new(),
            glossary_terms: BTreeSet::new(),
            relevance_score: 0.0,
            domain: String::new(),
            description: String::new(),
        }
    }

    /// Look up a column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether the id carries a schema part (`schema.table`).
    pub fn is_qualified(&self) -> bool {
        self.id.contains('.')
    }
}

/// Split `schema.table` on the first `.`. An id without a separator has an
/// empty schema.
pub fn split_table_id(id: &str) -> (&str, &str) {
    match id.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => ("", id),
    }
}

/// A retrieved external document (id prefixed with [`DOCUMENT_ID_PREFIX`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHit {
    pub id: String,
    pub text: String,
    pub score: f64,
}

/// Outcome of one retrieval request. Exactly one variant per request; the
/// variant decides whether SQL correction runs at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum RetrievalResult {
    Table(Vec<TableContext>),
    Document(Vec<DocumentHit>),
}

impl RetrievalResult {
    pub fn empty() -> Self {
        RetrievalResult::Table(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match self {
            RetrievalResult::Table(items) => items.len(),
            RetrievalResult::Document(items) => items.len(),
        }
    }

    /// Table contexts, or an empty slice for the document variant.
    pub fn tables(&self) -> &[TableContext] {
        match self {
            RetrievalResult::Table(items) => items,
            RetrievalResult::Document(_) => &[],
        }
    }
}

/// A classifier prediction: table id plus confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_table_id() {
        assert_eq!(split_table_id("sisplan.clientes"), ("sisplan", "clientes"));
        assert_eq!(split_table_id("clientes"), ("", "clientes"));
        assert_eq!(split_table_id("a.b.c"), ("a", "b.c"));
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let ctx = TableContext::new(
            "sisplan.clientes",
            vec![ColumnSpec::new("Status", "varchar")],
        );
        assert_eq!(ctx.schema, "sisplan");
        assert_eq!(ctx.table, "clientes");
        assert!(ctx.column("status").is_some());
        assert!(ctx.column("nome").is_none());
    }

    #[test]
    fn test_retrieval_result_len() {
        let r = RetrievalResult::Document(vec![DocumentHit {
            id: "doc:manual".to_string(),
            text: "...".to_string(),
            score: 0.1,
        }]);
        assert_eq!(r.len(), 1);
        assert!(r.tables().is_empty());
        assert!(RetrievalResult::empty().is_empty());
    }
}
