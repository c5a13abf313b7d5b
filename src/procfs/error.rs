use std::num::ParseIntError;
use std::path::PathBuf;

use crate::{fsutil, kvparser};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::ReadFileError),

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: kvparser::ParseError,
    },

    #[error("malformed `{path}`: {detail}")]
    MalformedStat {
        path: PathBuf,
        detail: &'static str,
    },

    #[error("invalid integer in `{path}`: `{value}`: {source}")]
    BadInteger {
        path: PathBuf,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
