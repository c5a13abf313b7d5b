//! Process and cgroup resource accounting for Linux.
//!
//! This library answers two questions about a running process (by PID, or
//! `self`): how much CPU time and resident memory it has consumed, and
//! what CPU and memory limits, usage, throttling and OOM-kill counts
//! apply to it under its enclosing control-group hierarchy (cgroup v1,
//! v2, or hybrid layouts, including cgroup namespaces and bind-mounted
//! sub-hierarchies).
//!
//! Everything works from pseudofiles under `/proc` and the cgroup
//! mountpoints; reads are synchronous, side-effect-free, and safe to call
//! from any number of threads.
//!
//! # Modules
//!
//! - [`cgroup`]: the resolver (controller name to filesystem path) and
//!   the hierarchical limit/stat aggregation.
//! - [`procfs`]: per-process RSS, CPU time, and RSS high-water mark.
//! - [`host`]: host-wide memory stats from `/proc/meminfo` and
//!   `/proc/vmstat`.
//! - [`kvparser`]: the schema-driven "key value" pseudofile decoder the
//!   typed readers are built on.
//! - [`mountinfo`]: cgroup mount discovery.
//!
//! # Example
//!
//! ```no_run
//! let cores = proclimits::cpu_count_limit();
//! let memory = proclimits::memory_stats()?;
//! println!("may use {cores} cores and {} bytes", memory.available);
//! # Ok::<(), proclimits::Error>(())
//! ```

pub mod cgroup;
mod error;
pub mod fsutil;
pub mod host;
pub mod kvparser;
pub mod mountinfo;
pub mod procfs;
mod stats;

pub use error::Error;
pub use stats::{CpuStats, CpuTime, MemoryStats};

/// Returns the number of CPUs worth of runtime this process may consume:
/// the lesser of the scheduler-visible CPU count and the effective cgroup
/// CPU limit.
///
/// Falls back to the CPU count alone when the cgroup limit is
/// unconstrained or cannot be read (the count already reflects CPU
/// affinity on Linux).
pub fn cpu_count_limit() -> f64 {
    let runtime_limit = num_cpus::get() as f64;
    match cgroup::cpu_limit() {
        Ok(cgroup_limit) if cgroup_limit > 0.0 && cgroup_limit < runtime_limit => cgroup_limit,
        Ok(_) => runtime_limit,
        Err(err) => {
            log::debug!("falling back to scheduler CPU count: {err}");
            runtime_limit
        }
    }
}

/// Returns CPU usage and throttling for the current process's binding
/// cgroup, with the limit clamped by the scheduler CPU count.
pub fn cpu_stats() -> Result<CpuStats, Error> {
    let mut stats = cgroup::cpu_stats()?;
    stats.limit = cpu_count_limit();
    Ok(stats)
}

/// Returns memory stats for the current process: the binding cgroup's
/// numbers when its limit bites below the host totals, the host's
/// otherwise.
///
/// Hierarchical limits are honored (the tightest ancestor limit wins);
/// swap at the cgroup level is reported only to the extent the kernel
/// exports it.
pub fn memory_stats() -> Result<MemoryStats, Error> {
    let cgroup_stats = cgroup::memory_stats()?;
    let host_stats = host::memory_stats()?;
    if cgroup_stats.total > 0 && cgroup_stats.total < host_stats.total {
        Ok(cgroup_stats)
    } else {
        Ok(host_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_count_limit_is_at_least_one_core() {
        let limit = cpu_count_limit();
        assert!(limit >= 1.0);
        assert!(limit <= 10_000.0, "implausible CPU limit: {limit}");
    }
}
