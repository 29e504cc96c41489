//! Minimal clause splitting: the WHERE body, its boolean fragments, and the
//! identifiers and comparisons inside a fragment.
//!
//! This is deliberately not a SQL parser. It knows just enough structure
//! (parenthesis depth, `BETWEEN ... AND`, clause boundary keywords) to cut a
//! WHERE body into fragments that can be dropped or rewritten one by one.

use super::token::{matching_paren, next_significant, tokenize, Token, TokenKind};
use super::{is_function_keyword, is_keyword};

/// Words that end a WHERE body at its own nesting level.
const BODY_BOUNDARIES: [&str; 12] = [
    "group", "order", "limit", "offset", "having", "union", "intersect", "except", "fetch",
    "window", "returning", "for",
];

/// A statement cut around its first WHERE keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhereClause<'a> {
    /// Everything before `WHERE`.
    pub head: &'a str,
    /// The keyword as written.
    pub keyword: &'a str,
    pub body: &'a str,
    /// Everything after the body (`GROUP BY ...`, `;`, a closing `)`).
    pub tail: &'a str,
}

/// Locate the first WHERE keyword (outside literals and comments) and the
/// extent of its body.
pub fn find_where(sql: &str) -> Option<WhereClause<'_>> {
    find_where_from(sql, 0)
}

/// Like [`find_where`], for the first WHERE starting at or after byte
/// `offset`.
pub fn find_where_from(sql: &str, offset: usize) -> Option<WhereClause<'_>> {
    let tokens = tokenize(sql);
    let at = tokens
        .iter()
        .position(|t| t.start >= offset && t.is_word("where"))?;

    let mut depth = 0i32;
    let mut end = sql.len();
    for t in &tokens[at + 1..] {
        if t.is_punct('(') {
            depth += 1;
        } else if t.is_punct(')') {
            if depth == 0 {
                end = t.start;
                break;
            }
            depth -= 1;
        } else if depth == 0
            && (t.is_punct(';') || BODY_BOUNDARIES.iter().any(|b| t.is_word(b)))
        {
            end = t.start;
            break;
        }
    }

    let kw = tokens[at];
    Some(WhereClause {
        head: &sql[..kw.start],
        keyword: kw.text,
        body: &sql[kw.end()..end],
        tail: &sql[end..],
    })
}

impl WhereClause<'_> {
    /// Rebuild the statement with a new body, or without the WHERE clause
    /// when `body` is `None`.
    pub fn render(&self, body: Option<&str>) -> String {
        let tail = self.tail.trim_start();
        let tail = if tail.is_empty() || tail.starts_with(';') || tail.starts_with(')') {
            tail.to_string()
        } else {
            format!(" {tail}")
        };

        let head = self.head.trim_end();
        match body {
            Some(body) if head.is_empty() => format!("{} {}{}", self.keyword, body.trim(), tail),
            Some(body) => format!("{} {} {}{}", head, self.keyword, body.trim(), tail),
            None => format!("{head}{tail}"),
        }
    }
}

/// What a correction stage does with one WHERE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyEdit {
    Keep,
    Replace(String),
    /// Drop the WHERE clause entirely.
    Remove,
}

/// Apply `edit` to every WHERE body in the statement, outermost first.
/// Bodies of subqueries nested inside an edited body are visited after it.
pub fn rewrite_where_bodies(sql: &str, mut edit: impl FnMut(&str) -> BodyEdit) -> String {
    let mut out = sql.to_string();
    let mut offset = 0;

    while let Some(clause) = find_where_from(&out, offset) {
        let head = clause.head.trim_end();
        let after_keyword = (if head.is_empty() { 0 } else { head.len() + 1 }) + clause.keyword.len();

        let (rewritten, resume) = match edit(clause.body) {
            BodyEdit::Keep => (None, clause.head.len() + clause.keyword.len()),
            BodyEdit::Replace(body) => (Some(clause.render(Some(&body))), after_keyword),
            BodyEdit::Remove => (Some(clause.render(None)), head.len()),
        };
        if let Some(rewritten) = rewritten {
            out = rewritten;
        }
        offset = resume;
    }

    out
}

/// One boolean fragment of a WHERE body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conjunct<'a> {
    /// `AND` / `OR` as written before this fragment; `None` for the first.
    pub connective: Option<&'a str>,
    pub text: &'a str,
}

/// Split a WHERE body on top-level `AND`/`OR`. The `AND` closing a
/// `BETWEEN` is not a connective; connectives inside parentheses never split.
pub fn split_conjuncts(body: &str) -> Vec<Conjunct<'_>> {
    let tokens = tokenize(body);
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_between = false;
    let mut seg_start = 0;
    let mut connective = None;

    for t in &tokens {
        if t.is_punct('(') {
            depth += 1;
        } else if t.is_punct(')') {
            depth -= 1;
        } else if depth == 0 && t.is_word("between") {
            in_between = true;
        } else if depth == 0 && (t.is_word("and") || t.is_word("or")) {
            if in_between && t.is_word("and") {
                in_between = false;
                continue;
            }
            push_conjunct(&mut out, connective, &body[seg_start..t.start]);
            connective = Some(t.text);
            seg_start = t.end();
        }
    }
    push_conjunct(&mut out, connective, &body[seg_start..]);

    out
}

fn push_conjunct<'a>(out: &mut Vec<Conjunct<'a>>, connective: Option<&'a str>, text: &'a str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push(Conjunct { connective, text });
    }
}

/// Join surviving fragments. The first fragment loses its connective; any
/// later fragment without one is joined with `AND`.
pub fn join_conjuncts(kept: &[(Option<&str>, String)]) -> String {
    let mut out = String::new();
    for (i, (connective, text)) in kept.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(connective.unwrap_or("AND"));
            out.push(' ');
        }
        out.push_str(text);
    }
    out
}

/// If the fragment is a single parenthesized group (optionally negated),
/// return the text before `(` and the text inside the parentheses.
pub fn as_group(fragment: &str) -> Option<(&str, &str)> {
    let tokens = tokenize(fragment);
    let mut open = next_significant(&tokens, 0)?;
    if tokens[open].is_word("not") {
        open = next_significant(&tokens, open + 1)?;
    }
    if !tokens[open].is_punct('(') {
        return None;
    }
    let close = matching_paren(&tokens, open)?;
    if next_significant(&tokens, close + 1).is_some() {
        return None;
    }
    Some((
        &fragment[..tokens[open].start],
        &fragment[tokens[open].end()..tokens[close].start],
    ))
}

/// A possibly qualified column reference, lowercased and unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// `alias` in `alias.col`, or `schema.table` in `schema.table.col`.
    pub qualifier: Option<String>,
    pub column: String,
}

impl ColumnRef {
    fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        let column = parts.pop()?;
        let qualifier = if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        };
        Some(Self { qualifier, column })
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Read a dotted identifier chain starting at `i`. Returns the parts and
/// the index just past the chain.
pub(crate) fn read_chain(tokens: &[Token<'_>], i: usize) -> (Vec<String>, usize) {
    let mut parts = vec![tokens[i].ident_name()];
    let mut j = i + 1;
    while j + 1 < tokens.len() && tokens[j].is_punct('.') && tokens[j + 1].is_ident() {
        parts.push(tokens[j + 1].ident_name());
        j += 2;
    }
    (parts, j)
}

fn is_call(tokens: &[Token<'_>], after: usize) -> Option<usize> {
    next_significant(tokens, after).filter(|&n| tokens[n].is_punct('('))
}

/// First identifier argument of the call whose `(` is at `open`, looking
/// through nested calls.
fn first_argument(tokens: &[Token<'_>], open: usize) -> Option<ColumnRef> {
    let close = matching_paren(tokens, open).unwrap_or(tokens.len());
    let mut k = open + 1;
    while k < close {
        let t = tokens[k];
        if !t.is_ident() {
            k += 1;
            continue;
        }
        let (parts, after) = read_chain(tokens, k);
        let bare_keyword = t.kind == TokenKind::Word && is_keyword(t.text) && parts.len() == 1;
        if is_call(tokens, after).is_some() || bare_keyword {
            k = after;
            continue;
        }
        return ColumnRef::from_parts(parts);
    }
    None
}

/// The column a predicate fragment is about: its leading identifier after
/// an optional `NOT`, or for a leading function call its first identifier
/// argument. `None` for fragments led by a literal or a keyword
/// (`1=1`, `EXISTS (...)`, `TRUE`).
pub fn leading_identifier(fragment: &str) -> Option<ColumnRef> {
    let tokens = tokenize(fragment);
    let mut i = next_significant(&tokens, 0)?;
    if tokens[i].is_word("not") {
        i = next_significant(&tokens, i + 1)?;
    }

    let first = tokens[i];
    if !first.is_ident() {
        return None;
    }
    let (parts, after) = read_chain(&tokens, i);
    let keyword = first.kind == TokenKind::Word && is_keyword(first.text) && parts.len() == 1;

    if let Some(open) = is_call(&tokens, after) {
        if keyword && !is_function_keyword(first.text) {
            return None;
        }
        return first_argument(&tokens, open);
    }
    if keyword {
        return None;
    }
    ColumnRef::from_parts(parts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    SingleQuoted,
    Number,
    DoubleQuoted,
    Boolean,
}

/// `column (= | != | <>) literal`, the only predicate shape type coercion
/// rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub raw_text: String,
    pub column_ref: ColumnRef,
    pub operator: String,
    pub raw_value: String,
    pub literal: LiteralKind,
    /// Byte range of the value inside `raw_text`.
    pub value_span: (usize, usize),
}

impl Predicate {
    /// The literal's content without quoting.
    pub fn unquoted_value(&self) -> String {
        match self.literal {
            LiteralKind::SingleQuoted => {
                let v = &self.raw_value;
                let inner = v.strip_prefix('\'').unwrap_or(v);
                let inner = inner.strip_suffix('\'').unwrap_or(inner);
                inner.replace("''", "'")
            }
            LiteralKind::DoubleQuoted => {
                let v = &self.raw_value;
                let inner = v.strip_prefix('"').unwrap_or(v);
                inner.strip_suffix('"').unwrap_or(inner).to_string()
            }
            LiteralKind::Number | LiteralKind::Boolean => self.raw_value.clone(),
        }
    }
}

/// Parse a fragment of the exact shape `identifier op literal`. Right-hand
/// identifiers are not literals, so `a.x = b.y` yields `None`.
pub fn parse_comparison(fragment: &str) -> Option<Predicate> {
    let tokens = tokenize(fragment);
    let first = next_significant(&tokens, 0)?;
    if !tokens[first].is_ident()
        || (tokens[first].kind == TokenKind::Word && is_keyword(tokens[first].text))
    {
        return None;
    }
    let (parts, after) = read_chain(&tokens, first);
    let column_ref = ColumnRef::from_parts(parts)?;

    let op = next_significant(&tokens, after)?;
    let operator = tokens[op];
    if operator.kind != TokenKind::Operator || !matches!(operator.text, "=" | "!=" | "<>") {
        return None;
    }

    let v = next_significant(&tokens, op + 1)?;
    let value = tokens[v];
    let (literal, start, end) = match value.kind {
        TokenKind::StringLit => (LiteralKind::SingleQuoted, value.start, value.end()),
        TokenKind::Number => (LiteralKind::Number, value.start, value.end()),
        TokenKind::QuotedIdent if value.text.starts_with('"') => {
            (LiteralKind::DoubleQuoted, value.start, value.end())
        }
        TokenKind::Word if value.is_word("true") || value.is_word("false") => {
            (LiteralKind::Boolean, value.start, value.end())
        }
        TokenKind::Operator if value.text == "-" => {
            let n = tokens.get(v + 1).filter(|t| t.kind == TokenKind::Number)?;
            (LiteralKind::Number, value.start, n.end())
        }
        _ => return None,
    };

    let last = if literal == LiteralKind::Number && value.text == "-" { v + 1 } else { v };
    if next_significant(&tokens, last + 1).is_some() {
        return None;
    }

    Some(Predicate {
        raw_text: fragment.to_string(),
        column_ref,
        operator: operator.text.to_string(),
        raw_value: fragment[start..end].to_string(),
        literal,
        value_span: (start, end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_where_stops_at_boundaries() {
        let w = find_where("SELECT * FROM t WHERE a = 1 ORDER BY a;").unwrap();
        assert_eq!(w.head, "SELECT * FROM t ");
        assert_eq!(w.body.trim(), "a = 1");
        assert_eq!(w.tail, "ORDER BY a;");

        let w = find_where("SELECT * FROM (SELECT * FROM t WHERE a = (1)) s").unwrap();
        assert_eq!(w.body.trim(), "a = (1)");
        assert_eq!(w.tail, ") s");
    }

    #[test]
    fn test_find_where_ignores_literals() {
        assert!(find_where("SELECT 'where' FROM t").is_none());
        let w = find_where("SELECT * FROM t WHERE x = 'order by'").unwrap();
        assert_eq!(w.body.trim(), "x = 'order by'");
    }

    #[test]
    fn test_render() {
        let w = find_where("SELECT * FROM t WHERE a = 1 LIMIT 5;").unwrap();
        assert_eq!(w.render(Some("b = 2")), "SELECT * FROM t WHERE b = 2 LIMIT 5;");
        assert_eq!(w.render(None), "SELECT * FROM t LIMIT 5;");

        let w = find_where("SELECT * FROM t WHERE a = 1;").unwrap();
        assert_eq!(w.render(None), "SELECT * FROM t;");
    }

    #[test]
    fn test_rewrite_visits_every_where() {
        let sql = "SELECT * FROM t WHERE a IN (SELECT b FROM u WHERE c = 1) AND d = 2;";
        let mut seen = Vec::new();
        let out = rewrite_where_bodies(sql, |body| {
            seen.push(body.trim().to_string());
            if body.trim() == "c = 1" {
                BodyEdit::Remove
            } else {
                BodyEdit::Keep
            }
        });
        assert_eq!(seen, vec!["a IN (SELECT b FROM u WHERE c = 1) AND d = 2", "c = 1"]);
        assert_eq!(out, "SELECT * FROM t WHERE a IN (SELECT b FROM u) AND d = 2;");
    }

    #[test]
    fn test_split_conjuncts_respects_between_and_parens() {
        let parts = split_conjuncts(" a BETWEEN 1 AND 2 or (b = 1 AND c = 2) AND d = 3 ");
        let texts: Vec<_> = parts.iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["a BETWEEN 1 AND 2", "(b = 1 AND c = 2)", "d = 3"]);
        assert_eq!(parts[0].connective, None);
        assert_eq!(parts[1].connective, Some("or"));
        assert_eq!(parts[2].connective, Some("AND"));
    }

    #[test]
    fn test_join_conjuncts() {
        let kept = vec![(Some("OR"), "a = 1".to_string()), (Some("or"), "b = 2".to_string())];
        assert_eq!(join_conjuncts(&kept), "a = 1 or b = 2");
    }

    #[test]
    fn test_as_group() {
        assert_eq!(as_group("(a = 1 OR b = 2)"), Some(("", "a = 1 OR b = 2")));
        assert_eq!(as_group("NOT (a = 1)"), Some(("NOT ", "a = 1")));
        assert_eq!(as_group("(a) = 1"), None);
    }

    #[test]
    fn test_leading_identifier() {
        let r = leading_identifier("cli.status = 1").unwrap();
        assert_eq!(r.qualifier.as_deref(), Some("cli"));
        assert_eq!(r.column, "status");

        let r = leading_identifier("sisplan.clientes.nome LIKE 'a%'").unwrap();
        assert_eq!(r.qualifier.as_deref(), Some("sisplan.clientes"));

        assert_eq!(leading_identifier("NOT ativo").unwrap().column, "ativo");
        assert_eq!(leading_identifier("upper(trim(c.nome)) = 'X'").unwrap().to_string(), "c.nome");
        assert_eq!(leading_identifier("\"Nome\" = 'x'").unwrap().column, "nome");

        assert!(leading_identifier("1=1").is_none());
        assert!(leading_identifier("EXISTS (SELECT 1 FROM t)").is_none());
        assert!(leading_identifier("TRUE").is_none());
        assert!(leading_identifier("count(*) > 1").is_none());
    }

    #[test]
    fn test_parse_comparison() {
        let p = parse_comparison("c.ativo = 1").unwrap();
        assert_eq!(p.column_ref.to_string(), "c.ativo");
        assert_eq!(p.operator, "=");
        assert_eq!(p.raw_value, "1");
        assert_eq!(p.literal, LiteralKind::Number);

        let p = parse_comparison("nome <> 'O''Brien'").unwrap();
        assert_eq!(p.unquoted_value(), "O'Brien");
        assert_eq!(&p.raw_text[p.value_span.0..p.value_span.1], "'O''Brien'");

        assert_eq!(parse_comparison("x != -5").unwrap().raw_value, "-5");
        assert_eq!(parse_comparison("x = \"abc\"").unwrap().literal, LiteralKind::DoubleQuoted);
        assert_eq!(parse_comparison("x = TRUE").unwrap().literal, LiteralKind::Boolean);

        assert!(parse_comparison("a.x = b.y").is_none());
        assert!(parse_comparison("x > 1").is_none());
        assert!(parse_comparison("x = 1 + 2").is_none());
    }
}
