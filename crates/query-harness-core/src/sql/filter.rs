//! Drop WHERE predicates that reference unknown aliases or columns.
//!
//! Generated SQL often invents plausible column names. A fragment led by
//! `alias.column` is dropped when the alias is not declared in `FROM`/`JOIN`
//! or its table lacks the column. A fragment led by a bare `column` is kept
//! when any retrieved context has that column. Fragments without a leading
//! identifier are always kept. Parenthesized groups are filtered
//! recursively and vanish when nothing inside survives.

use tracing::debug;

use super::clause::{
    as_group, join_conjuncts, leading_identifier, rewrite_where_bodies, split_conjuncts, BodyEdit,
};
use super::scope::{AliasTarget, ColumnScope};
use crate::models::TableContext;

pub fn filter(sql: &str, contexts: &[TableContext]) -> String {
    let scope = ColumnScope::new(sql, contexts);
    rewrite_where_bodies(sql, |body| filter_body(body, &scope))
}

fn filter_body(body: &str, scope: &ColumnScope) -> BodyEdit {
    let conjuncts = split_conjuncts(body);
    if conjuncts.is_empty() {
        return BodyEdit::Keep;
    }

    let mut kept = Vec::with_capacity(conjuncts.len());
    let mut changed = false;

    for c in conjuncts {
        if let Some((prefix, inner)) = as_group(c.text) {
            match filter_body(inner, scope) {
                BodyEdit::Keep => kept.push((c.connective, c.text.to_string())),
                BodyEdit::Replace(inner) => {
                    changed = true;
                    kept.push((c.connective, format!("{prefix}({inner})")));
                }
                BodyEdit::Remove => {
                    changed = true;
                    debug!(fragment = c.text, "dropped group: no predicate inside survived");
                }
            }
            continue;
        }

        match drop_reason(c.text, scope) {
            Some(reason) => {
                changed = true;
                debug!(fragment = c.text, %reason, "dropped predicate");
            }
            None => kept.push((c.connective, c.text.to_string())),
        }
    }

    if kept.is_empty() {
        BodyEdit::Remove
    } else if changed {
        BodyEdit::Replace(join_conjuncts(&kept))
    } else {
        BodyEdit::Keep
    }
}

fn drop_reason(fragment: &str, scope: &ColumnScope) -> Option<String> {
    let column = leading_identifier(fragment)?;

    let Some(alias) = &column.qualifier else {
        return (!scope.any_table_has_column(&column.column))
            .then(|| format!("no retrieved table has column `{}`", column.column));
    };

    match scope.alias(alias) {
        None => Some(format!("alias `{alias}` is not declared in FROM/JOIN")),
        Some(AliasTarget::Table(id)) if !scope.table_has_column(id, &column.column) => {
            Some(format!("`{id}` has no column `{}`", column.column))
        }
        Some(_) => None,
    }
}
