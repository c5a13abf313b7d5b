//! Parsing of `/proc/<pid>/cgroup` and matching its records to mounts.
//!
//! From cgroups(7), each line of `/proc/<pid>/cgroup` holds three
//! colon-separated fields, `hierarchy-ID:controller-list:cgroup-path`:
//! the hierarchy ID (0 for the v2 unified hierarchy), a comma-separated
//! controller list (empty for v2), and the cgroup path relative to the
//! root of that hierarchy as seen from the reading process's cgroup
//! namespace.

use std::path::{Path, PathBuf};

use crate::fsutil;
use crate::mountinfo::Mount;

use super::error::{Error, Result};
use super::path::{CGroupPath, Mode};

/// Hierarchy ID the kernel assigns to the cgroup v2 unified hierarchy.
pub const CGROUP_V2_HIERARCHY_ID: u32 = 0;

/// One record of `/proc/<pid>/cgroup`: a hierarchy the process belongs
/// to, the controllers bound to it, and the process's cgroup path within
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcHierarchy {
    /// Unique hierarchy ID; matches `/proc/cgroups` for v1, 0 for v2.
    pub hierarchy_id: u32,
    /// The raw comma-separated controller list; empty for v2.
    pub subsystems_csv: String,
    /// The controller list split apart; empty for v2.
    pub subsystems: Vec<String>,
    /// Cgroup path relative to the hierarchy root.
    pub path: String,
}

impl ProcHierarchy {
    /// Finds the mount through which this hierarchy's cgroup is reachable
    /// and returns the concrete filesystem location.
    ///
    /// Mounts are considered in file order. A mount is skipped when:
    ///
    /// - its root lies outside the reading process's cgroup namespace
    ///   (renders as `/..` ancestor entries, per cgroup_namespaces(7));
    /// - it is a v2 mount but this record is a v1 hierarchy, or vice
    ///   versa;
    /// - it is a v1 mount whose controller sequence differs from this
    ///   record's (both sequences originate from the kernel's own emission
    ///   order, so plain sequence equality is a reliable set comparison);
    /// - its root is a bind-mounted subtree that does not contain this
    ///   record's path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingMount`] when no mount qualifies.
    pub fn find_mount(&self, mounts: &[Mount]) -> Result<CGroupPath> {
        for mount in mounts {
            if mount.outside_namespace() {
                continue;
            }
            let matches = if mount.cgroup_v2 {
                self.hierarchy_id == CGROUP_V2_HIERARCHY_ID
            } else {
                !self.subsystems.is_empty() && mount.subsystems == self.subsystems
            };
            if !matches {
                continue;
            }
            // A bind mount of a sibling subtree has a root this record's
            // path does not extend; keep looking for a covering mount.
            let Ok(rel) = Path::new(&self.path).strip_prefix(&mount.root) else {
                continue;
            };
            let abs_path = if rel.as_os_str().is_empty() {
                mount.mountpoint.clone()
            } else {
                mount.mountpoint.join(rel)
            };
            return Ok(CGroupPath {
                abs_path,
                mount_path: mount.mountpoint.clone(),
                mode: Mode::from_cgroup_v2(mount.cgroup_v2),
            });
        }
        Err(Error::NoMatchingMount {
            hierarchy: self.hierarchy_id,
            path: self.path.clone(),
            mounts: mounts.len(),
        })
    }
}

/// Reads and parses `/proc/<pid>/cgroup` for the given proc directory
/// (a PID rendered as decimal, or `self`).
pub(crate) fn read_hierarchies(proc_dir: &str) -> Result<Vec<ProcHierarchy>> {
    let path: PathBuf = ["/proc", proc_dir, "cgroup"].iter().collect();
    let contents = fsutil::read_to_string(&path)?;
    parse_hierarchies(&path, &contents)
}

/// Returns the cgroup hierarchies the current process is a member of.
pub fn self_hierarchies() -> Result<Vec<ProcHierarchy>> {
    read_hierarchies("self")
}

/// Returns the cgroup hierarchies the process with the given PID is a
/// member of.
pub fn pid_hierarchies(pid: i32) -> Result<Vec<ProcHierarchy>> {
    read_hierarchies(&pid.to_string())
}

fn parse_hierarchies(path: &Path, contents: &str) -> Result<Vec<ProcHierarchy>> {
    let mut out = Vec::new();
    for (idx, line) in contents.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, ':');
        let (Some(id), Some(csv), Some(cg_path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::MalformedLine {
                path: path.to_path_buf(),
                line: idx + 1,
                content: line.to_owned(),
            });
        };
        let hierarchy_id = id.parse::<u32>().map_err(|source| Error::BadInteger {
            path: path.to_path_buf(),
            value: id.to_owned(),
            source,
        })?;
        // A lone empty controller list (the v2 entry) is an empty
        // sequence, not one empty-string element.
        let subsystems = if csv.is_empty() {
            Vec::new()
        } else {
            csv.split(',').map(str::to_owned).collect()
        };
        out.push(ProcHierarchy {
            hierarchy_id,
            subsystems_csv: csv.to_owned(),
            subsystems,
            path: cg_path.to_owned(),
        });
    }
    Ok(out)
}
