//! Per-statement name scope: which tables the retrieved contexts know,
//! which columns they have, and what each `FROM`/`JOIN` alias points to.
//!
//! Built once per correction stage from the statement text and the contexts
//! and dropped with it.

use std::collections::{HashMap, HashSet};

use super::clause::ColumnRef;
use super::{is_function_keyword, is_keyword};
use super::token::{matching_paren, tokenize, Token, TokenKind};
use crate::models::{TableContext, DEFAULT_COLUMN_TYPE};

/// What a name declared in `FROM`/`JOIN` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// A table reference, resolved to a context id when one matches, or to
    /// the reference's own lowercase text otherwise.
    Table(String),
    /// A subquery or set-returning function; its columns are unknown.
    Derived,
}

#[derive(Debug, Default)]
pub struct ColumnScope {
    /// context id → column → declared type (all lowercase).
    table_columns: HashMap<String, HashMap<String, String>>,
    /// Every context's columns merged; later contexts overwrite earlier ones.
    all_columns: HashMap<String, String>,
    aliases: HashMap<String, AliasTarget>,
    /// Names introduced by an explicit alias, derived ones included.
    declared_aliases: HashSet<String>,
    schemas: HashSet<String>,
    tables: HashSet<String>,
}

impl ColumnScope {
    pub fn new(sql: &str, contexts: &[TableContext]) -> Self {
        let mut scope = ColumnScope::default();

        for ctx in contexts {
            let columns: HashMap<String, String> = ctx
                .columns
                .iter()
                .map(|c| {
                    let ty = c.declared_type.trim().to_lowercase();
                    let ty = if ty.is_empty() { DEFAULT_COLUMN_TYPE.to_string() } else { ty };
                    (c.name.to_lowercase(), ty)
                })
                .collect();
            scope
                .all_columns
                .extend(columns.iter().map(|(k, v)| (k.clone(), v.clone())));
            scope.table_columns.insert(ctx.id.to_lowercase(), columns);

            if !ctx.schema.is_empty() {
                scope.schemas.insert(ctx.schema.to_lowercase());
            }
            if !ctx.table.is_empty() {
                scope.tables.insert(ctx.table.to_lowercase());
            }
        }

        scope.bind_aliases(sql, contexts);
        scope
    }

    pub fn alias(&self, name: &str) -> Option<&AliasTarget> {
        self.aliases.get(&name.to_lowercase())
    }

    /// Whether the context `table_id` declares `column`.
    pub fn table_has_column(&self, table_id: &str, column: &str) -> bool {
        self.table_columns
            .get(&table_id.to_lowercase())
            .is_some_and(|cols| cols.contains_key(&column.to_lowercase()))
    }

    /// Whether any context declares `column`.
    pub fn any_table_has_column(&self, column: &str) -> bool {
        self.all_columns.contains_key(&column.to_lowercase())
    }

    /// A context's schema or table name, or an explicitly declared alias.
    /// Table references no context resolves are bound for lookups but are
    /// not known names.
    pub fn is_known_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.schemas.contains(&name)
            || self.tables.contains(&name)
            || self.declared_aliases.contains(&name)
    }

    fn declare(&mut self, alias: String, target: AliasTarget) {
        self.declared_aliases.insert(alias.clone());
        self.aliases.insert(alias, target);
    }

    /// Declared type of a column reference. Qualified references use the
    /// aliased table when it declares the column; everything else falls back
    /// to the merged map.
    pub fn column_type(&self, column: &ColumnRef) -> Option<&str> {
        let qualified = column.qualifier.as_ref().and_then(|q| match self.alias(q)? {
            AliasTarget::Table(id) => self.table_columns.get(id)?.get(&column.column),
            AliasTarget::Derived => None,
        });
        qualified
            .or_else(|| self.all_columns.get(&column.column))
            .map(String::as_str)
    }

    fn bind_aliases(&mut self, sql: &str, contexts: &[TableContext]) {
        let tokens = tokenize(sql);
        let sig: Vec<Token<'_>> = tokens.into_iter().filter(|t| !t.is_trivia()).collect();

        // For each open paren: whether it opens a function call.
        let mut call_stack: Vec<bool> = Vec::new();
        let mut i = 0;
        while i < sig.len() {
            let t = sig[i];
            if t.is_punct('(') {
                call_stack.push(i > 0 && opens_call(&sig[i - 1]));
            } else if t.is_punct(')') {
                call_stack.pop();
            } else if !call_stack.last().copied().unwrap_or(false) {
                if t.is_word("from") {
                    i = self.bind_table_list(&sig, i + 1, contexts);
                    continue;
                }
                if t.is_word("join") {
                    i = self.bind_table_ref(&sig, i + 1, contexts);
                    continue;
                }
            }
            i += 1;
        }
    }

    fn bind_table_list(&mut self, sig: &[Token<'_>], mut i: usize, contexts: &[TableContext]) -> usize {
        loop {
            i = self.bind_table_ref(sig, i, contexts);
            if i < sig.len() && sig[i].is_punct(',') {
                i += 1;
            } else {
                return i;
            }
        }
    }

    /// Bind one table reference and its optional alias. Returns the index of
    /// the first token after it. A subquery's opening paren is not consumed
    /// so the outer scan still sees the nested `FROM`.
    fn bind_table_ref(&mut self, sig: &[Token<'_>], mut i: usize, contexts: &[TableContext]) -> usize {
        while i < sig.len() && (sig[i].is_word("only") || sig[i].is_word("lateral")) {
            i += 1;
        }
        let Some(first) = sig.get(i) else {
            return i;
        };

        if first.is_punct('(') {
            if let Some(close) = matching_paren(sig, i) {
                let (alias, _) = read_alias(sig, close + 1);
                if let Some(alias) = alias {
                    self.declare(alias, AliasTarget::Derived);
                }
            }
            return i;
        }
        if !first.is_ident() || (first.kind == TokenKind::Word && is_keyword(first.text)) {
            return i;
        }

        let mut parts = vec![first.ident_name()];
        let mut j = i + 1;
        while j + 1 < sig.len() && sig[j].is_punct('.') && sig[j + 1].is_ident() {
            parts.push(sig[j + 1].ident_name());
            j += 2;
        }

        if j < sig.len() && sig[j].is_punct('(') {
            let close = matching_paren(sig, j).unwrap_or(sig.len() - 1);
            let (alias, next) = read_alias(sig, close + 1);
            if let Some(alias) = alias {
                self.declare(alias, AliasTarget::Derived);
            }
            return next;
        }

        let reference = parts.join(".");
        let target = resolve_table(&reference, contexts);
        if let Some(last) = parts.last().filter(|_| parts.len() > 1) {
            self.aliases
                .entry(last.clone())
                .or_insert_with(|| AliasTarget::Table(target.clone()));
        }
        self.aliases
            .entry(reference)
            .or_insert_with(|| AliasTarget::Table(target.clone()));

        let (alias, next) = read_alias(sig, j);
        if let Some(alias) = alias {
            self.declare(alias, AliasTarget::Table(target));
        }
        next
    }
}

/// `[AS] alias` at `i`. Keywords are never aliases.
fn read_alias(sig: &[Token<'_>], i: usize) -> (Option<String>, usize) {
    match sig.get(i) {
        Some(t) if t.is_word("as") => match sig.get(i + 1) {
            Some(a) if a.is_ident() => (Some(a.ident_name()), i + 2),
            _ => (None, i + 1),
        },
        Some(t) if t.kind == TokenKind::QuotedIdent => (Some(t.ident_name()), i + 1),
        Some(t) if t.kind == TokenKind::Word && !is_keyword(t.text) => (Some(t.ident_name()), i + 1),
        _ => (None, i),
    }
}

/// Whether a `(` right after `t` opens a function call.
fn opens_call(t: &Token<'_>) -> bool {
    match t.kind {
        TokenKind::QuotedIdent => true,
        TokenKind::Word => !is_keyword(t.text) || is_function_keyword(t.text),
        _ => false,
    }
}

/// Resolve a table reference to the id of the context whose id or table
/// part it equals; otherwise the reference itself.
fn resolve_table(reference: &str, contexts: &[TableContext]) -> String {
    contexts
        .iter()
        .find(|c| c.id.eq_ignore_ascii_case(reference) || c.table.eq_ignore_ascii_case(reference))
        .map(|c| c.id.to_lowercase())
        .unwrap_or_else(|| reference.to_string())
}
