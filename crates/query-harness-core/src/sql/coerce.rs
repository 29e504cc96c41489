//! Rewrite literals in `column = literal` predicates to match the column's
//! declared type.
//!
//! | Column family | Literal | Result |
//! |---------------|---------|--------|
//! | numeric | digits (quoted or not) | unquoted digits |
//! | numeric | anything else | predicate replaced by `1=1` |
//! | text | value in the domain table | translated, quoted value |
//! | text | not single-quoted | single-quoted |
//! | other / unresolved | any | untouched |

use std::collections::HashMap;

use tracing::debug;

use super::clause::{
    as_group, join_conjuncts, parse_comparison, rewrite_where_bodies, split_conjuncts, BodyEdit,
    LiteralKind,
};
use super::scope::ColumnScope;
use crate::models::TableContext;

/// Predicate that replaces a comparison no literal rewrite can save.
pub const TAUTOLOGY: &str = "1=1";

const NUMERIC_TYPES: [&str; 17] = [
    "smallint", "integer", "int", "int2", "int4", "int8", "bigint", "numeric", "decimal", "real",
    "float", "float4", "float8", "double precision", "serial", "smallserial", "bigserial",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Numeric,
    Text,
    Other,
}

/// Classify a declared type by its base name (`varchar(20)` → `varchar`).
pub fn type_family(declared_type: &str) -> TypeFamily {
    let lower = declared_type.trim().to_lowercase();
    if lower.contains('[') {
        return TypeFamily::Other;
    }
    let base = lower.split('(').next().unwrap_or("").trim();

    if NUMERIC_TYPES.contains(&base) {
        TypeFamily::Numeric
    } else if base.contains("char") || matches!(base, "text" | "citext" | "name") {
        TypeFamily::Text
    } else {
        TypeFamily::Other
    }
}

/// Per-column translation of loose literals into a column's stored codes,
/// e.g. `ativo`: `1`/`true` → `S`, `0`/`false` → `N`. Lookups are
/// case-insensitive on both column and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValueTable {
    columns: HashMap<String, HashMap<String, String>>,
}

impl Default for DomainValueTable {
    fn default() -> Self {
        Self::empty().with_column(
            "ativo",
            [("1", "S"), ("true", "S"), ("0", "N"), ("false", "N")],
        )
    }
}

impl DomainValueTable {
    pub fn empty() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    pub fn with_column<K, V>(mut self, column: &str, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let entry = self.columns.entry(column.to_lowercase()).or_default();
        for (from, to) in values {
            entry.insert(from.as_ref().to_lowercase(), to.into());
        }
        self
    }

    pub fn translate(&self, column: &str, value: &str) -> Option<&str> {
        self.columns
            .get(&column.to_lowercase())?
            .get(&value.to_lowercase())
            .map(String::as_str)
    }
}

impl From<HashMap<String, HashMap<String, String>>> for DomainValueTable {
    fn from(map: HashMap<String, HashMap<String, String>>) -> Self {
        map.into_iter()
            .fold(Self::empty(), |table, (column, values)| table.with_column(&column, values))
    }
}

pub fn coerce(sql: &str, contexts: &[TableContext], domain: &DomainValueTable) -> String {
    let scope = ColumnScope::new(sql, contexts);
    rewrite_where_bodies(sql, |body| coerce_body(body, &scope, domain))
}

fn coerce_body(body: &str, scope: &ColumnScope, domain: &DomainValueTable) -> BodyEdit {
    let mut fragments = Vec::new();
    let mut changed = false;

    for c in split_conjuncts(body) {
        let rewritten = match as_group(c.text) {
            Some((prefix, inner)) => match coerce_body(inner, scope, domain) {
                BodyEdit::Replace(inner) => Some(format!("{prefix}({inner})")),
                _ => None,
            },
            None => coerce_predicate(c.text, scope, domain),
        };
        match rewritten {
            Some(text) => {
                changed = true;
                fragments.push((c.connective, text));
            }
            None => fragments.push((c.connective, c.text.to_string())),
        }
    }

    if changed {
        BodyEdit::Replace(join_conjuncts(&fragments))
    } else {
        BodyEdit::Keep
    }
}

/// The rewritten fragment, or `None` when it stays as is.
fn coerce_predicate(fragment: &str, scope: &ColumnScope, domain: &DomainValueTable) -> Option<String> {
    let predicate = parse_comparison(fragment)?;
    let declared = scope.column_type(&predicate.column_ref)?;
    let value = predicate.unquoted_value();

    let literal = match type_family(declared) {
        TypeFamily::Numeric if is_digits(&value) => value,
        TypeFamily::Numeric => {
            debug!(fragment, declared, "non-numeric literal for numeric column; using tautology");
            return Some(TAUTOLOGY.to_string());
        }
        TypeFamily::Text => match domain.translate(&predicate.column_ref.column, &value) {
            Some(code) => quote(code),
            None if predicate.literal == LiteralKind::SingleQuoted => return None,
            None => quote(&value),
        },
        TypeFamily::Other => return None,
    };

    if literal == predicate.raw_value {
        return None;
    }
    debug!(fragment, %literal, "coerced literal");
    let (start, end) = predicate.value_span;
    Some(format!("{}{}{}", &fragment[..start], literal, &fragment[end..]))
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;

    fn contexts() -> Vec<TableContext> {
        vec![TableContext::new(
            "sisplan.clientes",
            vec![
                ColumnSpec::new("ativo", "varchar(1)"),
                ColumnSpec::new("codigo", "integer"),
                ColumnSpec::new("nome", "text"),
                ColumnSpec::new("criado", "timestamp"),
            ],
        )]
    }

    fn run(sql: &str) -> String {
        coerce(sql, &contexts(), &DomainValueTable::default())
    }

    #[test]
    fn test_type_family() {
        assert_eq!(type_family("INTEGER"), TypeFamily::Numeric);
        assert_eq!(type_family("numeric(10,2)"), TypeFamily::Numeric);
        assert_eq!(type_family("double precision"), TypeFamily::Numeric);
        assert_eq!(type_family("character varying(40)"), TypeFamily::Text);
        assert_eq!(type_family("bpchar"), TypeFamily::Text);
        assert_eq!(type_family("citext"), TypeFamily::Text);
        assert_eq!(type_family("date"), TypeFamily::Other);
        assert_eq!(type_family("int4[]"), TypeFamily::Other);
    }

    #[test]
    fn test_domain_value_translation() {
        assert_eq!(
            run("SELECT * FROM clientes WHERE ativo = 1"),
            "SELECT * FROM clientes WHERE ativo = 'S'"
        );
        assert_eq!(
            run("SELECT * FROM clientes WHERE ativo = false;"),
            "SELECT * FROM clientes WHERE ativo = 'N';"
        );
    }

    #[test]
    fn test_numeric_normalization_and_tautology() {
        assert_eq!(
            run("SELECT * FROM clientes WHERE codigo = '42'"),
            "SELECT * FROM clientes WHERE codigo = 42"
        );
        assert_eq!(
            run("SELECT * FROM clientes WHERE codigo = 'abc' AND nome = 'x'"),
            "SELECT * FROM clientes WHERE 1=1 AND nome = 'x'"
        );
        assert_eq!(
            run("SELECT * FROM clientes WHERE codigo != -3"),
            "SELECT * FROM clientes WHERE 1=1"
        );
    }

    #[test]
    fn test_text_values_get_quoted() {
        assert_eq!(
            run("SELECT * FROM clientes c WHERE c.nome = \"O'Neil\""),
            "SELECT * FROM clientes c WHERE c.nome = 'O''Neil'"
        );
        assert_eq!(
            run("SELECT * FROM clientes WHERE (nome <> 12 OR ativo = 'S')"),
            "SELECT * FROM clientes WHERE (nome <> '12' OR ativo = 'S')"
        );
    }

    #[test]
    fn test_untouched_cases() {
        for sql in [
            "SELECT * FROM clientes WHERE criado = '2024-01-01'",
            "SELECT * FROM clientes WHERE desconhecida = 1",
            "SELECT * FROM clientes c JOIN x ON true WHERE c.codigo = x.codigo",
            "SELECT * FROM clientes WHERE codigo > 'a'",
            "SELECT * FROM clientes",
        ] {
            assert_eq!(run(sql), sql);
        }
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let once = run("SELECT * FROM clientes WHERE ativo = true AND codigo = 'z' AND nome = 7;");
        assert_eq!(once, "SELECT * FROM clientes WHERE ativo = 'S' AND 1=1 AND nome = '7';");
        assert_eq!(run(&once), once);
    }

    #[test]
    fn test_domain_table_from_config_map() {
        let mut values = HashMap::new();
        values.insert("Sim".to_string(), "1".to_string());
        let mut map = HashMap::new();
        map.insert("Flag".to_string(), values);
        let table = DomainValueTable::from(map);
        assert_eq!(table.translate("flag", "SIM"), Some("1"));
        assert_eq!(table.translate("ativo", "1"), None);
    }
}
