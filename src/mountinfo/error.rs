use crate::fsutil;

use super::escape::EscapeError;
use super::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::ReadFileError),

    #[error("failed to parse mountinfo line: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to unescape mount {field} `{value}`: {source}")]
    Escape {
        field: &'static str,
        value: String,
        #[source]
        source: EscapeError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
