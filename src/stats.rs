//! Snapshot value types shared by the cgroup, host, and per-process
//! readers.
//!
//! Integer fields follow the sentinel conventions of the kernel files they
//! are derived from: `-1` means "unknown", `0` means "unconstrained" for
//! CPU limits, and `i64::MAX` stands in for a `max` (no limit) memory
//! setting. Keeping the sentinels at this boundary keeps the aggregator's
//! comparisons cheap; wrap them in `Option` at an application's own API
//! layer if needed.

use std::ops::{Add, Sub};
use std::time::Duration;

/// User and system CPU time consumed by a process or cgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTime {
    /// Time scheduled in user mode.
    pub utime: Duration,
    /// Time scheduled in kernel mode.
    pub stime: Duration,
}

impl Add for CpuTime {
    type Output = CpuTime;

    fn add(self, other: CpuTime) -> CpuTime {
        CpuTime {
            utime: self.utime + other.utime,
            stime: self.stime + other.stime,
        }
    }
}

impl Sub for CpuTime {
    type Output = CpuTime;

    fn sub(self, other: CpuTime) -> CpuTime {
        CpuTime {
            utime: self.utime - other.utime,
            stime: self.stime - other.stime,
        }
    }
}

/// CPU limit, usage, and throttling for a cgroup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuStats {
    /// Effective CPU limit in cores; `0` or below means unconstrained.
    pub limit: f64,
    /// Cumulative user/system time.
    pub usage: CpuTime,
    /// Total time the cgroup spent throttled by the bandwidth controller.
    pub throttled: Duration,
}

/// Memory limits, usage and OOM-kill accounting.
///
/// All byte values are `i64` so the `-1` unknown sentinel survives
/// arithmetic against kernel-reported quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// Memory limit in bytes.
    pub total: i64,
    /// Bytes below the limit, treating kernel page-cache data as used.
    pub free: i64,
    /// Bytes below the limit, treating reclaimable page-cache data as
    /// available.
    pub available: i64,
    /// OOM kills charged to the cgroup (or the host).
    pub oom_kills: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_time_arithmetic() {
        let a = CpuTime {
            utime: Duration::from_millis(500),
            stime: Duration::from_millis(200),
        };
        let b = CpuTime {
            utime: Duration::from_millis(100),
            stime: Duration::from_millis(50),
        };
        assert_eq!(
            a + b,
            CpuTime {
                utime: Duration::from_millis(600),
                stime: Duration::from_millis(250),
            }
        );
        assert_eq!(
            a - b,
            CpuTime {
                utime: Duration::from_millis(400),
                stime: Duration::from_millis(150),
            }
        );
    }
}
