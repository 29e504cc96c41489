//! Schema-qualify bare table names.

use tracing::debug;

use super::token::{contains_qualified_name, tokenize, TokenKind};
use crate::models::TableContext;

/// Rewrite every bare, unquoted occurrence of each context's table name to
/// `schema.table`, in retrieval order.
///
/// A context is skipped when its `schema.table` is already written as
/// identifiers in the statement (case-insensitive), which makes the pass
/// idempotent. Words
/// directly after a `.` are never rewritten, and literals, quoted
/// identifiers and comments are separate tokens so they are never touched.
pub fn qualify(sql: &str, contexts: &[TableContext]) -> String {
    let mut out = sql.to_string();

    for ctx in contexts {
        if !ctx.is_qualified() || ctx.schema.is_empty() || ctx.table.is_empty() {
            continue;
        }
        if contains_qualified_name(&tokenize(&out), &ctx.schema, &ctx.table) {
            continue;
        }
        out = qualify_table(&out, &ctx.schema, &ctx.table);
    }

    out
}

fn qualify_table(sql: &str, schema: &str, table: &str) -> String {
    let tokens = tokenize(sql);
    let mut out = String::with_capacity(sql.len() + schema.len() + 1);
    let mut rewritten = 0usize;

    for (i, t) in tokens.iter().enumerate() {
        let after_dot = i > 0 && tokens[i - 1].is_punct('.');
        if t.kind == TokenKind::Word && t.text.eq_ignore_ascii_case(table) && !after_dot {
            out.push_str(schema);
            out.push('.');
            rewritten += 1;
        }
        out.push_str(t.text);
    }

    if rewritten > 0 {
        debug!(schema, table, rewritten, "qualified bare table references");
    }
    out
}
