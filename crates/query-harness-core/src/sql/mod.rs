//! SQL grounding and repair.
//!
//! | Stage | Module | Fails? |
//! |-------|--------|--------|
//! | clean generated text | [`clean`] | never |
//! | schema-qualify bare tables | [`qualify`] | never |
//! | drop predicates on unknown columns | [`filter`] | never |
//! | coerce literals to column types | [`coerce`] | never |
//! | column existence gate | [`validate`] | `UnknownColumnReference` |
//! | mutation keyword gate | [`safety`] | `UnsafeStatement` |
//!
//! [`pipeline::correct`] runs them in that order. The stages share a
//! lossless [`token`] stream, the WHERE/FROM helpers in [`clause`], and the
//! per-statement column [`scope`].

pub mod clause;
pub mod clean;
pub mod coerce;
pub mod filter;
pub mod pipeline;
pub mod qualify;
pub mod safety;
pub mod scope;
pub mod token;
pub mod validate;

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Reserved words, operator words, common function names and type names.
/// Never treated as column references.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "select", "from", "where", "and", "or", "limit", "offset", "order", "by", "group",
        "having", "join", "left", "right", "inner", "outer", "full", "cross", "natural",
        "using", "on", "distinct", "asc", "desc", "insert", "update", "delete", "merge",
        "create", "alter", "drop", "truncate", "comment", "rename", "returning", "union",
        "all", "intersect", "except", "in", "not", "between", "like", "ilike", "similar",
        "exists", "is", "null", "true", "false", "case", "when", "then", "else", "end",
        "count", "sum", "avg", "min", "max", "coalesce", "nullif", "greatest", "least",
        "fetch", "partition", "over", "filter", "as", "into",
        // clause, window, cast and type names
        "with", "recursive", "lateral", "only", "window", "for", "any", "some", "to",
        "escape", "cast", "extract", "interval", "nulls", "first", "last", "next", "rows",
        "row", "range", "unbounded", "preceding", "following", "current", "current_date",
        "current_time", "current_timestamp", "localtimestamp", "date", "time",
        "timestamp", "timestamptz", "year", "month", "day", "hour", "minute", "second",
        "epoch", "zone", "at", "integer", "int", "bigint", "smallint", "numeric",
        "decimal", "real", "float", "double", "precision", "varchar", "char",
        "character", "varying", "text", "boolean", "bool", "set", "values", "default",
        "collate", "top", "percent", "ties",
    ]
    .into_iter()
    .collect()
});

/// Whether `word` (any case) is a reserved word.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word.to_lowercase().as_str())
}

/// Non-keyword functions accepted by the column gate when called.
static BUILTIN_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "upper", "lower", "initcap", "trim", "ltrim", "rtrim", "btrim", "length",
        "char_length", "substring", "substr", "position", "replace", "concat", "lpad",
        "rpad", "split_part", "regexp_replace", "to_char", "to_date", "to_number",
        "to_timestamp", "date_trunc", "date_part", "age", "now", "abs", "round", "trunc",
        "ceil", "ceiling", "floor", "mod", "power", "sqrt", "sign", "string_agg",
        "array_agg", "row_number", "rank", "dense_rank", "lag", "lead", "generate_series",
        "ifnull", "nvl",
    ]
    .into_iter()
    .collect()
});

/// Whether `word` (any case) names a known built-in function.
pub fn is_builtin_function(word: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(word.to_lowercase().as_str())
}

/// Keywords that behave like functions when followed by `(`.
pub(crate) fn is_function_keyword(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "count" | "sum" | "avg" | "min" | "max" | "coalesce" | "nullif" | "greatest"
            | "least" | "cast" | "extract" | "date" | "left" | "right"
    )
}
