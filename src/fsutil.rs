use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileOpenError {
    /// Whether the underlying failure was a missing file.
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

/// Error that occurs when reading a file's contents fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file `{path}`: {source}")]
pub struct ReadFileError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ReadFileError {
    /// Whether the underlying failure was a missing file.
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use proclimits::fsutil;
/// let reader = fsutil::open_file_reader("/some/file.txt")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Reads the entire contents of a file into a `String`.
///
/// `/proc` and cgroup pseudofiles are small and generated on open, so a
/// single whole-file read is the natural access pattern. The descriptor is
/// closed before this function returns on every path.
///
/// # Errors
///
/// Returns a [`ReadFileError`] if the file cannot be opened or read.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String, ReadFileError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| ReadFileError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|source| ReadFileError {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(contents)
}
