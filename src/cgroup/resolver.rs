//! Controller-to-filesystem-path resolution.
//!
//! Combines the three kernel tables: `/proc/cgroups` (controller to
//! hierarchy ID), `/proc/<pid>/cgroup` (hierarchy ID to cgroup path), and
//! `/proc/self/mountinfo` (hierarchy to mountpoint), into the concrete
//! directory where a controller's pseudofiles for a process live.

use crate::mountinfo;

use super::error::{Error, Result};
use super::path::CGroupPath;
use super::proc_cgroup::{self, CGROUP_V2_HIERARCHY_ID};
use super::subsystems;

/// Pseudo-controller name addressing the cgroup v2 unified hierarchy.
///
/// `/proc/<pid>/cgroup` lists no controllers for the v2 entry, so callers
/// that want the unified hierarchy itself (rather than a named controller)
/// pass this constant.
pub const CGROUP_V2_QUASI_SUBSYSTEM: &str = "cgroup2 unified hierarchy";

/// Returns the cgroup path associated with `subsystem` for the current
/// process.
pub fn self_subsystem_path(subsystem: &str) -> Result<CGroupPath> {
    subsystem_path("self", subsystem)
}

/// Returns the cgroup path associated with `subsystem` for the process
/// with the given PID.
pub fn pid_subsystem_path(pid: i32, subsystem: &str) -> Result<CGroupPath> {
    subsystem_path(&pid.to_string(), subsystem)
}

fn subsystem_path(proc_dir: &str, subsystem: &str) -> Result<CGroupPath> {
    let hierarchy_id = if subsystem == CGROUP_V2_QUASI_SUBSYSTEM {
        CGROUP_V2_HIERARCHY_ID
    } else {
        let subsystems = subsystems::read_subsystems()?;
        subsystems
            .iter()
            .find(|s| s.name == subsystem)
            .map(|s| s.hierarchy)
            .ok_or_else(|| Error::NoSuchController(subsystem.to_owned()))?
    };

    let hierarchies = proc_cgroup::read_hierarchies(proc_dir)?;
    let hierarchy = hierarchies
        .iter()
        .find(|h| h.hierarchy_id == hierarchy_id)
        .ok_or(Error::NoSuchHierarchy {
            hierarchy: hierarchy_id,
        })?;

    let mounts = mountinfo::cgroup_mounts()?;
    let resolved = hierarchy.find_mount(&mounts)?;
    log::debug!(
        "resolved controller `{}` for pid `{}` to `{}` ({:?})",
        subsystem,
        proc_dir,
        resolved.abs_path.display(),
        resolved.mode,
    );
    Ok(resolved)
}
