//! Filesystem location of a resolved cgroup.

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use super::error::{Error, Result};

/// Which cgroup flavor a resolved path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Unknown,
    V1,
    V2,
}

impl Mode {
    pub(crate) fn from_cgroup_v2(cgroup_v2: bool) -> Self {
        if cgroup_v2 {
            Mode::V2
        } else {
            Mode::V1
        }
    }
}

/// The filesystem location of one cgroup within one mounted hierarchy.
///
/// `abs_path` always has `mount_path` as a prefix; walking [`parent`]
/// repeatedly climbs toward the mount root and stops there.
///
/// [`parent`]: CGroupPath::parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGroupPath {
    /// Directory holding this cgroup's pseudofiles.
    pub abs_path: PathBuf,
    /// Mountpoint of the hierarchy the cgroup belongs to.
    pub mount_path: PathBuf,
    /// v1/v2 flavor of the hierarchy.
    pub mode: Mode,
}

/// Strips a single trailing separator, mirroring how the kernel never
/// emits one but callers occasionally append one.
fn strip_trailing_slash(path: &Path) -> PathBuf {
    let bytes = path.as_os_str().as_bytes();
    if bytes.len() > 1 && bytes.ends_with(b"/") {
        PathBuf::from(OsString::from_vec(bytes[..bytes.len() - 1].to_vec()))
    } else {
        path.to_path_buf()
    }
}

impl CGroupPath {
    /// Returns the parent cgroup's path, as long as it would not pass the
    /// root of the mountpoint. The second value reports whether a new path
    /// was returned; once it is `false` the walk has reached the mount
    /// root itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPathState`] if `abs_path` differs from
    /// `mount_path` yet contains no further separator to truncate at,
    /// which cannot happen for a path produced by the resolver.
    pub fn parent(&self) -> Result<(CGroupPath, bool)> {
        let path = strip_trailing_slash(&self.abs_path);
        let mount = strip_trailing_slash(&self.mount_path);
        if path == mount {
            return Ok((
                CGroupPath {
                    abs_path: path,
                    mount_path: mount,
                    mode: self.mode,
                },
                false,
            ));
        }
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidPathState {
                path: path.clone(),
                mount: mount.clone(),
            })?
            .to_path_buf();
        Ok((
            CGroupPath {
                abs_path: parent,
                mount_path: mount,
                mode: self.mode,
            },
            true,
        ))
    }
}
