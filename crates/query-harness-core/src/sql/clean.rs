//! Extract one statement from raw model output.
//!
//! Model replies wrap SQL in Markdown fences, backticks and explanatory
//! prose. The cleaner keeps the first fenced block's content when there is
//! one, removes stray backticks, and returns the span from the first
//! `SELECT` or CTE-opening `WITH` through the first `;`. A `WITH` only
//! counts when followed by `RECURSIVE` or `name [(cols)] AS (`, so prose
//! such as "the query with a filter" is skipped. Text without either
//! keyword is passed through trimmed; later stages and execution decide
//! what to do with it.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::token::tokenize;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

static STATEMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\bselect\b|\bwith\s+(?:recursive\b|(?:"[^"]+"|[a-z_][a-z0-9_]*)\s*(?:\([^)]*\)\s*)?as\s*\()"#,
    )
    .expect("valid keyword regex")
});

pub fn clean(raw: &str) -> String {
    let unfenced = match FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        Some(block) => block.as_str(),
        None => raw,
    };
    let text = unfenced.replace('`', "");

    let Some(start) = STATEMENT_START.find(&text).map(|m| m.start()) else {
        debug!("no SELECT/WITH in generated text; passing through");
        let trimmed = text.trim();
        return terminate_at_first(trimmed, trimmed.find(';'));
    };

    let statement = &text[start..];
    let terminator = tokenize(statement)
        .iter()
        .find(|t| t.is_punct(';'))
        .map(|t| t.start);
    terminate_at_first(statement, terminator)
}

fn terminate_at_first(text: &str, terminator: Option<usize>) -> String {
    match terminator {
        Some(end) if end <= text.len() => format!("{};", text[..end].trim()),
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statement() {
        assert_eq!(clean("  SELECT 1;  "), "SELECT 1;");
    }

    #[test]
    fn test_fenced_block_with_info_string() {
        let raw = "Aqui está a consulta:\n```sql\nSELECT * FROM clientes;\n```\nEspero ter ajudado.";
        assert_eq!(clean(raw), "SELECT * FROM clientes;");
    }

    #[test]
    fn test_first_fenced_block_wins() {
        let raw = "```\nSELECT a FROM t;\n```\n```sql\nSELECT b FROM u;\n```";
        assert_eq!(clean(raw), "SELECT a FROM t;");
    }

    #[test]
    fn test_prose_around_statement() {
        let raw = "Here's the query: select nome from clientes where ativo = 'S'; hope it helps";
        assert_eq!(clean(raw), "select nome from clientes where ativo = 'S';");
    }

    #[test]
    fn test_truncates_after_first_terminator() {
        assert_eq!(clean("SELECT 1; DROP TABLE x;"), "SELECT 1;");
    }

    #[test]
    fn test_semicolon_inside_literal_is_not_a_terminator() {
        assert_eq!(clean("SELECT 'a;b' FROM t; x"), "SELECT 'a;b' FROM t;");
    }

    #[test]
    fn test_with_clause_and_stray_backticks() {
        assert_eq!(
            clean("`WITH x AS (SELECT 1) SELECT * FROM x`"),
            "WITH x AS (SELECT 1) SELECT * FROM x"
        );
    }

    #[test]
    fn test_no_statement_passes_through() {
        assert_eq!(clean("  desculpe, não sei  "), "desculpe, não sei");
    }

    #[test]
    fn test_prose_with_is_not_a_cte() {
        let raw = "Here is the query with a filter:\nSELECT nome FROM clientes;";
        assert_eq!(clean(raw), "SELECT nome FROM clientes;");
    }

    #[test]
    fn test_recursive_and_column_list_ctes() {
        assert_eq!(
            clean("Veja: WITH RECURSIVE t(n) AS (SELECT 1) SELECT n FROM t;"),
            "WITH RECURSIVE t(n) AS (SELECT 1) SELECT n FROM t;"
        );
        assert_eq!(
            clean("with totais (v) as (select 1) select v from totais;"),
            "with totais (v) as (select 1) select v from totais;"
        );
    }
}
