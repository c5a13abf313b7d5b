use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Errors produced while decoding a key/value pseudofile against a
/// [`Schema`](super::Schema).
///
/// Every variant carries the 1-based line number of the offending line so a
/// caller can point at the exact spot in the kernel-exported table.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line} has no `{separator}` separator: `{content}`")]
    MalformedLine {
        line: usize,
        separator: &'static str,
        content: String,
    },

    #[error("invalid integer for `{key}` at line {line}: `{value}`: {source}")]
    BadInteger {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid float for `{key}` at line {line}: `{value}`: {source}")]
    BadFloat {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseFloatError,
    },

    #[error("value for `{key}` at line {line} does not fit declared {width} field: `{value}`")]
    Overflow {
        key: String,
        value: String,
        line: usize,
        width: &'static str,
    },

    #[error("unrecognized field `{key}` at line {line} and no fallback declared")]
    UnknownField { key: String, line: usize },
}

pub type Result<T> = std::result::Result<T, ParseError>;
