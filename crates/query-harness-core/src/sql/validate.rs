//! Final column-existence gate.
//!
//! After every repair pass, each remaining identifier must be a keyword, a
//! built-in function called with `(`, a retrieved schema or table name, an
//! explicitly declared alias, a name declared with `AS`, or a column of some
//! retrieved context. Anything else is reported instead of silently removed,
//! including a `FROM` table no context resolves.

use std::collections::HashSet;

use super::{is_builtin_function, is_function_keyword, is_keyword};
use super::scope::ColumnScope;
use super::token::{next_significant, prev_significant, tokenize, TokenKind};
use crate::error::CorrectionError;
use crate::models::TableContext;

pub fn validate(sql: &str, contexts: &[TableContext]) -> Result<(), CorrectionError> {
    let scope = ColumnScope::new(sql, contexts);
    let tokens = tokenize(sql);

    let declared: HashSet<String> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_word("as"))
        .filter_map(|(i, _)| next_significant(&tokens, i + 1))
        .filter(|&n| tokens[n].is_ident())
        .map(|n| tokens[n].ident_name())
        .collect();

    for (i, t) in tokens.iter().enumerate() {
        if !t.is_ident() {
            continue;
        }
        let name = t.ident_name();
        if (t.kind == TokenKind::Word && is_keyword(&name)) || name.chars().count() < 2 {
            continue;
        }
        if scope.is_known_name(&name)
            || declared.contains(&name)
            || scope.any_table_has_column(&name)
        {
            continue;
        }
        let is_call = next_significant(&tokens, i + 1).is_some_and(|n| tokens[n].is_punct('('));
        if is_call && (is_function_keyword(&name) || is_builtin_function(&name)) {
            continue;
        }
        // type name in a `::type` cast
        if prev_significant(&tokens, i).is_some_and(|p| tokens[p].text == "::") {
            continue;
        }

        return Err(CorrectionError::UnknownColumnReference {
            token: t.text.to_string(),
        });
    }

    Ok(())
}
