//! Lossless SQL tokenizer.
//!
//! Every byte of the input belongs to exactly one token, so concatenating
//! the token texts reproduces the input. Correction stages rewrite SQL by
//! splicing token spans instead of substituting over raw text, which keeps
//! string literals, quoted identifiers and comments out of reach.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword.
    Word,
    /// `"quoted identifier"` or `` `backticked` ``.
    QuotedIdent,
    /// `'string literal'` (with `''` escapes).
    StringLit,
    Number,
    Operator,
    /// `. , ( ) ; [ ]`
    Punct,
    Whitespace,
    /// `-- line` or `/* block */`.
    Comment,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the tokenized string.
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == 1 && self.text.starts_with(c)
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Identifier-like: a bare word or a quoted identifier.
    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }

    /// Identifier text without its quotes, lowercased.
    pub fn ident_name(&self) -> String {
        unquote_ident(self.text).to_lowercase()
    }
}

/// Strip one level of `"..."` or `` `...` `` quoting.
pub fn unquote_ident(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2
        && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'`' && b[b.len() - 1] == b'`'))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

const TWO_CHAR_OPERATORS: [&str; 8] = ["<>", "!=", "<=", ">=", "||", "::", "~*", "!~"];

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '<' | '>' | '!' | '+' | '-' | '*' | '/' | '%' | '^' | '~' | '|' | '&' | ':'
    )
}

fn char_at(s: &str, i: usize) -> Option<char> {
    s.get(i..).and_then(|rest| rest.chars().next())
}

/// Consume a quoted run starting at `i` (which holds `quote`). A doubled
/// quote is an escape. Unterminated runs extend to the end of input.
fn scan_quoted(s: &str, i: usize, quote: char) -> usize {
    let mut j = i + quote.len_utf8();
    while let Some(c) = char_at(s, j) {
        j += c.len_utf8();
        if c == quote {
            if char_at(s, j) == Some(quote) {
                j += quote.len_utf8();
                continue;
            }
            return j;
        }
    }
    s.len()
}

pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(ch) = char_at(sql, i) {
        let start = i;
        let next = char_at(sql, i + ch.len_utf8());

        let kind = match ch {
            c if c.is_whitespace() => {
                while let Some(c) = char_at(sql, i) {
                    if !c.is_whitespace() {
                        break;
                    }
                    i += c.len_utf8();
                }
                TokenKind::Whitespace
            }
            '-' if next == Some('-') => {
                i = sql[i..].find('\n').map_or(sql.len(), |n| i + n);
                TokenKind::Comment
            }
            '/' if next == Some('*') => {
                i = sql[i + 2..].find("*/").map_or(sql.len(), |n| i + 2 + n + 2);
                TokenKind::Comment
            }
            '\'' => {
                i = scan_quoted(sql, i, '\'');
                TokenKind::StringLit
            }
            '"' | '`' => {
                i = scan_quoted(sql, i, ch);
                TokenKind::QuotedIdent
            }
            c if c.is_ascii_digit() => {
                while char_at(sql, i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                if char_at(sql, i) == Some('.')
                    && char_at(sql, i + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    i += 1;
                    while char_at(sql, i).is_some_and(|c| c.is_ascii_digit()) {
                        i += 1;
                    }
                }
                if matches!(char_at(sql, i), Some('e' | 'E'))
                    && char_at(sql, i + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    i += 1;
                    while char_at(sql, i).is_some_and(|c| c.is_ascii_digit()) {
                        i += 1;
                    }
                }
                TokenKind::Number
            }
            c if c.is_alphabetic() || c == '_' => {
                while let Some(c) = char_at(sql, i) {
                    if c.is_alphanumeric() || c == '_' || c == '$' {
                        i += c.len_utf8();
                    } else {
                        break;
                    }
                }
                TokenKind::Word
            }
            '.' | ',' | '(' | ')' | ';' | '[' | ']' => {
                i += 1;
                TokenKind::Punct
            }
            c if is_operator_char(c) => {
                let pair = sql.get(i..i + 2).unwrap_or("");
                i += if TWO_CHAR_OPERATORS.contains(&pair) { 2 } else { 1 };
                TokenKind::Operator
            }
            c => {
                i += c.len_utf8();
                TokenKind::Other
            }
        };

        tokens.push(Token {
            kind,
            text: &sql[start..i],
            start,
        });
    }

    tokens
}

/// Parenthesis depth before each token.
pub fn depths(tokens: &[Token<'_>]) -> Vec<i32> {
    let mut depth = 0i32;
    tokens
        .iter()
        .map(|t| {
            let before = depth;
            if t.is_punct('(') {
                depth += 1;
            } else if t.is_punct(')') {
                depth -= 1;
            }
            before
        })
        .collect()
}

/// Index of the next non-trivia token at or after `from`.
pub fn next_significant(tokens: &[Token<'_>], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

/// Index of the closest non-trivia token before `before`.
pub fn prev_significant(tokens: &[Token<'_>], before: usize) -> Option<usize> {
    (0..before).rev().find(|&i| !tokens[i].is_trivia())
}

/// Whether `schema.table` is written out as identifier tokens. Literals and
/// comments never match, and neither does a longer name sharing a prefix.
pub fn contains_qualified_name(tokens: &[Token<'_>], schema: &str, table: &str) -> bool {
    let schema = schema.to_lowercase();
    let table = table.to_lowercase();
    let sig: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    sig.windows(3).any(|w| {
        w[0].is_ident()
            && w[1].is_punct('.')
            && w[2].is_ident()
            && w[0].ident_name() == schema
            && w[2].ident_name() == table
    })
}

/// Index of the `)` matching the `(` at `open`.
pub fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.is_punct('(') {
            depth += 1;
        } else if t.is_punct(')') {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_qualified_name_matches_whole_identifiers() {
        let tokens = tokenize("SELECT * FROM Sisplan . \"clientes\" WHERE obs = 'vendas.pedidos'");
        assert!(contains_qualified_name(&tokens, "sisplan", "clientes"));
        assert!(!contains_qualified_name(&tokens, "sisplan", "cli"));
        assert!(!contains_qualified_name(&tokens, "vendas", "pedidos"));
    }

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        tokenize(sql)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_is_lossless() {
        let sql = "SELECT \"Nome\", 'it''s' -- note\nFROM t /* c */ WHERE x <> 1.5e3;";
        let joined: String = tokenize(sql).iter().map(|t| t.text).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn test_tokenize_kinds() {
        assert_eq!(
            kinds("cli.status != 'a b' AND n >= 10"),
            vec![
                (TokenKind::Word, "cli"),
                (TokenKind::Punct, "."),
                (TokenKind::Word, "status"),
                (TokenKind::Operator, "!="),
                (TokenKind::StringLit, "'a b'"),
                (TokenKind::Word, "AND"),
                (TokenKind::Word, "n"),
                (TokenKind::Operator, ">="),
                (TokenKind::Number, "10"),
            ]
        );
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        let toks = tokenize("x = 'open");
        assert_eq!(toks.last().unwrap().kind, TokenKind::StringLit);
        assert_eq!(toks.last().unwrap().text, "'open");
    }

    #[test]
    fn test_comments() {
        let toks = kinds("a -- tail\nb /* mid */ c");
        assert_eq!(toks[1], (TokenKind::Comment, "-- tail"));
        assert_eq!(toks[3], (TokenKind::Comment, "/* mid */"));
    }

    #[test]
    fn test_cast_operator_and_unicode_word() {
        let toks = kinds("descrição::text");
        assert_eq!(toks[0], (TokenKind::Word, "descrição"));
        assert_eq!(toks[1], (TokenKind::Operator, "::"));
    }

    #[test]
    fn test_matching_paren_and_depths() {
        let toks = tokenize("(a (b) c) d");
        assert_eq!(matching_paren(&toks, 0), Some(toks.len() - 3));
        let d = depths(&toks);
        assert_eq!(d[0], 0);
        assert_eq!(d[1], 1);
        assert_eq!(*d.last().unwrap(), 0);
    }

    #[test]
    fn test_ident_name_unquotes() {
        let toks = tokenize("\"Nome\"");
        assert_eq!(toks[0].ident_name(), "nome");
    }
}
