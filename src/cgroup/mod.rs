//! Cgroup resolution and resource accounting.
//!
//! This module answers, for a process identified by PID or `self`, what
//! CPU and memory constraints its enclosing control groups impose and how
//! much of those resources it has consumed. It works from the reading
//! process's own view of three kernel tables (`/proc/cgroups`,
//! `/proc/<pid>/cgroup`, `/proc/self/mountinfo`) and tolerates cgroup
//! namespaces, bind-mounted sub-hierarchies, and v1/v2/hybrid layouts.
//!
//! # Key components
//!
//! - [`self_subsystem_path`] / [`pid_subsystem_path`]: map a controller
//!   name to the directory holding its pseudofiles.
//! - [`CGroupPath`]: a resolved location, walkable toward the mount root
//!   via [`CGroupPath::parent`].
//! - [`cpu`] / [`memory`]: per-level limit and stat readers, plus the
//!   hierarchy-aggregating [`cpu::cpu_limit`], [`cpu::cpu_stats`],
//!   [`memory::memory_limit`] and [`memory::memory_stats`], which report
//!   the level whose limit actually binds.

mod aggregate;
pub mod cpu;
mod error;
pub mod memory;
mod path;
mod proc_cgroup;
mod resolver;
mod subsystems;

use std::path::Path;

use crate::fsutil;

pub use cpu::{cpu_limit, cpu_stats};
pub use error::{Error, Result};
pub use memory::{memory_limit, memory_stats};
pub use path::{CGroupPath, Mode};
pub use proc_cgroup::{
    pid_hierarchies, self_hierarchies, ProcHierarchy, CGROUP_V2_HIERARCHY_ID,
};
pub use resolver::{pid_subsystem_path, self_subsystem_path, CGROUP_V2_QUASI_SUBSYSTEM};
pub use subsystems::{read_subsystems, Subsystem};

/// Reads a single-value pseudofile as a base-10 integer.
pub(crate) fn read_int_file(path: &Path) -> Result<i64> {
    let contents = fsutil::read_to_string(path)?;
    let value = contents.trim();
    value.parse::<i64>().map_err(|source| Error::BadInteger {
        path: path.to_path_buf(),
        value: value.to_owned(),
        source,
    })
}
