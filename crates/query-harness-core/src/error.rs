//! Errors the correction pipeline surfaces to its caller.
//!
//! Everything else (malformed metadata, an unparseable statement, an empty
//! retrieval) is recovered locally and only logged.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrectionError {
    /// An identifier survived every repair pass but resolves to nothing known.
    #[error("unknown column reference: {token}")]
    UnknownColumnReference { token: String },

    /// The statement contains a data-mutating keyword.
    #[error("unsafe statement: contains `{keyword}`")]
    UnsafeStatement { keyword: String },
}
