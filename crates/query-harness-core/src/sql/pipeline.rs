//! The correction pipeline: clean → qualify → filter → coerce →
//! (validate) → finalize → safety gate.

use super::clean::clean;
use super::coerce::{coerce, DomainValueTable};
use super::filter::filter;
use super::qualify::qualify;
use super::safety::ensure_read_only;
use super::token::{tokenize, TokenKind};
use super::validate::validate;
use crate::error::CorrectionError;
use crate::models::TableContext;

/// Contexts forwarded to correction by default.
pub const DEFAULT_MAX_CONTEXTS: usize = 3;

#[derive(Debug, Clone)]
pub struct CorrectionOptions {
    /// Only the first `max_contexts` ranked contexts are used.
    pub max_contexts: usize,
    /// Run the column-existence gate before finalizing.
    pub validate_columns: bool,
    pub domain_values: DomainValueTable,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            max_contexts: DEFAULT_MAX_CONTEXTS,
            validate_columns: false,
            domain_values: DomainValueTable::default(),
        }
    }
}

/// Turn raw model output into one grounded, read-only statement.
pub fn correct(
    raw: &str,
    contexts: &[TableContext],
    options: &CorrectionOptions,
) -> Result<String, CorrectionError> {
    let contexts = &contexts[..contexts.len().min(options.max_contexts)];

    let sql = clean(raw);
    let sql = qualify(&sql, contexts);
    let sql = filter(&sql, contexts);
    let sql = coerce(&sql, contexts, &options.domain_values);
    if options.validate_columns {
        validate(&sql, contexts)?;
    }

    let sql = finalize(&sql);
    ensure_read_only(&sql)?;
    Ok(sql)
}

/// Collapse whitespace and comments outside literals to single spaces and
/// terminate with exactly one `;`.
pub fn finalize(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 1);
    for t in tokenize(sql) {
        match t.kind {
            TokenKind::Whitespace | TokenKind::Comment => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            _ => out.push_str(t.text),
        }
    }

    let body = out.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body};")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;

    fn clientes() -> Vec<TableContext> {
        vec![TableContext::new(
            "sisplan.clientes",
            vec![
                ColumnSpec::new("status", "varchar"),
                ColumnSpec::new("nome", "text"),
                ColumnSpec::new("ativo", "varchar"),
                ColumnSpec::new("codigo", "integer"),
            ],
        )]
    }

    #[test]
    fn test_end_to_end_example() {
        let raw = "SELECT * FROM clientes WHERE cli.status = 1 AND nome_inexistente = 'x';";
        let out = correct(raw, &clientes(), &CorrectionOptions::default()).unwrap();
        assert_eq!(out, "SELECT * FROM sisplan.clientes;");
    }

    #[test]
    fn test_fenced_reply_is_repaired() {
        let raw = "Claro!\n```sql\nSELECT nome\n  FROM clientes c\n WHERE c.ativo = 1\n   AND c.codigo = 'abc'\n```";
        let out = correct(raw, &clientes(), &CorrectionOptions::default()).unwrap();
        assert_eq!(
            out,
            "SELECT nome FROM sisplan.clientes c WHERE c.ativo = 'S' AND 1=1;"
        );
    }

    #[test]
    fn test_validation_catches_unknown_select_column() {
        let options = CorrectionOptions {
            validate_columns: true,
            ..CorrectionOptions::default()
        };
        let err = correct("SELECT fantasma FROM clientes;", &clientes(), &options).unwrap_err();
        assert_eq!(
            err,
            CorrectionError::UnknownColumnReference {
                token: "fantasma".to_string()
            }
        );
    }

    #[test]
    fn test_safety_gate_runs_last() {
        let err = correct("DELETE FROM clientes;", &clientes(), &CorrectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, CorrectionError::UnsafeStatement { .. }));
    }

    #[test]
    fn test_max_contexts_limits_grounding() {
        let mut contexts = vec![TableContext::new("a.x", Vec::new())];
        contexts.extend(clientes());
        let options = CorrectionOptions {
            max_contexts: 1,
            ..CorrectionOptions::default()
        };
        let out = correct("SELECT * FROM clientes", &contexts, &options).unwrap();
        assert_eq!(out, "SELECT * FROM clientes;");
    }

    #[test]
    fn test_finalize() {
        assert_eq!(finalize("SELECT  'a   b'\n FROM t -- c\n;;"), "SELECT 'a   b' FROM t;");
        assert_eq!(finalize("SELECT 1"), "SELECT 1;");
    }
}
