//! Per-process accounting from `/proc/<pid>` pseudofiles.
//!
//! These readers cover the process-level counterpart of the cgroup
//! accounting: resident set size, cumulative CPU time (including reaped
//! children), and the RSS high-water mark.

mod error;
pub mod process;
pub mod status;

use std::path::PathBuf;

pub use error::{Error, Result};
pub use process::{cpu_time, max_rss, reset_max_rss, rss};
pub use status::{read_status, ProcStatus};

pub(crate) fn proc_file(pid: i32, leaf: &str) -> PathBuf {
    ["/proc", &pid.to_string(), leaf].iter().collect()
}

/// Scheduler ticks per second (USER_HZ), the unit of the legacy CPU-time
/// accounting files. Falls back to the kernel's historical 100 Hz if
/// sysconf refuses to answer.
pub(crate) fn clock_ticks() -> u64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks <= 0 {
        100
    } else {
        ticks as u64
    }
}

/// System page size in bytes (falls back to 4096 if sysconf fails).
pub(crate) fn page_size() -> i64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_ticks_is_sane() {
        let ticks = clock_ticks();
        assert!(ticks > 0);
        assert!(ticks <= 1_000_000, "implausible USER_HZ: {ticks}");
    }

    #[test]
    fn page_size_is_sane() {
        let size = page_size();
        assert!(size >= 4096);
        assert_eq!(size % 4096, 0);
    }
}
