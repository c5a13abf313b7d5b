use std::num::ParseIntError;
use std::path::PathBuf;

use crate::{fsutil, kvparser, mountinfo};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::ReadFileError),

    #[error(transparent)]
    Mountinfo(#[from] mountinfo::Error),

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: kvparser::ParseError,
    },

    #[error("malformed line {line} in `{path}`: `{content}`")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("invalid integer in `{path}`: `{value}`: {source}")]
    BadInteger {
        path: PathBuf,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid boolean in `{path}`: `{value}`")]
    BadBool { path: PathBuf, value: String },

    #[error("`{path}` header is missing required column `{column}`")]
    MissingColumn {
        path: PathBuf,
        column: &'static str,
    },

    #[error("`{path}` header repeats column `{column}` at indexes {first} and {second}")]
    DuplicateColumn {
        path: PathBuf,
        column: String,
        first: usize,
        second: usize,
    },

    #[error("row {line} of `{path}` has {got} columns, header has {want}")]
    ColumnCount {
        path: PathBuf,
        line: usize,
        got: usize,
        want: usize,
    },

    #[error("no cgroup hierarchy associated with controller `{0}`")]
    NoSuchController(String),

    #[error("process is not a member of cgroup hierarchy {hierarchy}")]
    NoSuchHierarchy { hierarchy: u32 },

    #[error(
        "no usable mount for hierarchy {hierarchy} and path `{path}` \
         (found {mounts} cgroup/cgroup2 mounts)"
    )]
    NoMatchingMount {
        hierarchy: u32,
        path: String,
        mounts: usize,
    },

    #[error("cgroup path `{path}` has no separator beyond mount root `{mount}`")]
    InvalidPathState { path: PathBuf, mount: PathBuf },

    #[error("cgroup path `{path}` has an unresolved v1/v2 mode")]
    UnknownMode { path: PathBuf },

    #[error("cgroups are not supported on this system")]
    Unsupported,
}

impl Error {
    /// Whether this error is a missing pseudofile.
    ///
    /// The aggregator walks hierarchies where inner levels routinely lack
    /// some files (e.g. `memory.max` on a root cgroup) and needs to treat
    /// those gaps differently from structural failures.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Read(err) => err.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
