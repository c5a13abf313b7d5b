//! CPU limit and usage readers for cgroup v1 and v2.
//!
//! v1 splits the data across the `cpu` controller (`cpu.cfs_quota_us`,
//! `cpu.cfs_period_us`, `cpu.stat`) and the `cpuacct` controller
//! (`cpuacct.usage_user`/`cpuacct.usage_sys` in nanoseconds, or the older
//! `cpuacct.stat` in scheduler ticks). v2 consolidates everything into
//! `cpu.max` and `cpu.stat` with microsecond fields.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::fsutil;
use crate::kvparser::{Fallback, FieldSetter, KvFile, Schema};
use crate::procfs;
use crate::stats::{CpuStats, CpuTime};

use super::aggregate;
use super::error::{Error, Result};
use super::path::{CGroupPath, Mode};
use super::read_int_file;
use super::resolver;

const CFS_QUOTA_FILE: &str = "cpu.cfs_quota_us";
const CFS_PERIOD_FILE: &str = "cpu.cfs_period_us";
const CPU_STAT_FILE: &str = "cpu.stat";
const CPU_MAX_FILE: &str = "cpu.max";
const CPUACCT_USAGE_USER_FILE: &str = "cpuacct.usage_user";
const CPUACCT_USAGE_SYS_FILE: &str = "cpuacct.usage_sys";
const CPUACCT_STAT_FILE: &str = "cpuacct.stat";

/// Throttling counters from a v1 `cpu.stat` file. Times are nanoseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStatV1 {
    pub nr_periods: i64,
    pub nr_throttled: i64,
    pub throttled_time: i64,
    pub nr_bursts: i64,
    pub burst_time: i64,
    pub wait_sum: i64,
    pub unknown: HashMap<String, i64>,
}

static CPU_STAT_V1_SCHEMA: LazyLock<Schema<CpuStatV1>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("nr_periods", FieldSetter::I64(|s: &mut CpuStatV1, v| s.nr_periods = v))
        .field("nr_throttled", FieldSetter::I64(|s, v| s.nr_throttled = v))
        .field("throttled_time", FieldSetter::I64(|s, v| s.throttled_time = v))
        .field("nr_bursts", FieldSetter::I64(|s, v| s.nr_bursts = v))
        .field("burst_time", FieldSetter::I64(|s, v| s.burst_time = v))
        .field("wait_sum", FieldSetter::I64(|s, v| s.wait_sum = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for CpuStatV1 {
    fn schema() -> &'static Schema<Self> {
        &CPU_STAT_V1_SCHEMA
    }
}

/// Aggregate usage from the legacy `cpuacct.stat` file, in scheduler
/// ticks (USER_HZ).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuacctStat {
    pub user: i64,
    pub system: i64,
    pub unknown: HashMap<String, i64>,
}

static CPUACCT_STAT_SCHEMA: LazyLock<Schema<CpuacctStat>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("user", FieldSetter::I64(|s: &mut CpuacctStat, v| s.user = v))
        .field("system", FieldSetter::I64(|s, v| s.system = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for CpuacctStat {
    fn schema() -> &'static Schema<Self> {
        &CPUACCT_STAT_SCHEMA
    }
}

/// Usage and throttling counters from a v2 `cpu.stat` file. Times are
/// microseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStatV2 {
    pub usage_usec: i64,
    pub user_usec: i64,
    pub system_usec: i64,
    pub nr_periods: i64,
    pub nr_throttled: i64,
    pub throttled_usec: i64,
    pub nr_bursts: i64,
    pub burst_usec: i64,
    pub unknown: HashMap<String, i64>,
}

static CPU_STAT_V2_SCHEMA: LazyLock<Schema<CpuStatV2>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("usage_usec", FieldSetter::I64(|s: &mut CpuStatV2, v| s.usage_usec = v))
        .field("user_usec", FieldSetter::I64(|s, v| s.user_usec = v))
        .field("system_usec", FieldSetter::I64(|s, v| s.system_usec = v))
        .field("nr_periods", FieldSetter::I64(|s, v| s.nr_periods = v))
        .field("nr_throttled", FieldSetter::I64(|s, v| s.nr_throttled = v))
        .field("throttled_usec", FieldSetter::I64(|s, v| s.throttled_usec = v))
        .field("nr_bursts", FieldSetter::I64(|s, v| s.nr_bursts = v))
        .field("burst_usec", FieldSetter::I64(|s, v| s.burst_usec = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for CpuStatV2 {
    fn schema() -> &'static Schema<Self> {
        &CPU_STAT_V2_SCHEMA
    }
}

fn duration_from_nanos(ns: i64) -> Duration {
    Duration::from_nanos(ns.max(0) as u64)
}

fn duration_from_micros(us: i64) -> Duration {
    Duration::from_micros(us.max(0) as u64)
}

/// Reads the CPU limit imposed at one cgroup level, in cores.
///
/// `0` means unconstrained; both v1 (`cpu.cfs_quota_us` of `-1`) and v2
/// (`cpu.max` of `max`) express that state.
pub fn read_cpu_limit(path: &CGroupPath) -> Result<f64> {
    match path.mode {
        Mode::V1 => read_cpu_limit_v1(path),
        Mode::V2 => read_cpu_limit_v2(path),
        Mode::Unknown => Err(Error::UnknownMode {
            path: path.abs_path.clone(),
        }),
    }
}

fn read_cpu_limit_v1(path: &CGroupPath) -> Result<f64> {
    let quota_us = read_int_file(&path.abs_path.join(CFS_QUOTA_FILE))?;
    let period_us = read_int_file(&path.abs_path.join(CFS_PERIOD_FILE))?;
    if quota_us <= 0 || period_us <= 0 {
        return Ok(0.0);
    }
    Ok(quota_us as f64 / period_us as f64)
}

fn read_cpu_limit_v2(path: &CGroupPath) -> Result<f64> {
    let file = path.abs_path.join(CPU_MAX_FILE);
    let contents = fsutil::read_to_string(&file)?;
    parse_cpu_max(&file, &contents)
}

fn parse_cpu_max(path: &Path, contents: &str) -> Result<f64> {
    let mut fields = contents.split_whitespace();
    let (Some(quota), Some(period)) = (fields.next(), fields.next()) else {
        return Err(Error::MalformedLine {
            path: path.to_path_buf(),
            line: 1,
            content: contents.trim_end().to_owned(),
        });
    };
    if quota == "max" {
        return Ok(0.0);
    }
    let parse = |value: &str| -> Result<i64> {
        value.parse::<i64>().map_err(|source| Error::BadInteger {
            path: path.to_path_buf(),
            value: value.to_owned(),
            source,
        })
    };
    let quota_us = parse(quota)?;
    let period_us = parse(period)?;
    if quota_us <= 0 || period_us <= 0 {
        return Ok(0.0);
    }
    Ok(quota_us as f64 / period_us as f64)
}

/// Reads CPU stats at one v1 cgroup level.
///
/// Throttling and the limit come from the `cpu` controller directory;
/// usage comes from the `cpuacct` controller's resolved path (the two are
/// co-mounted as `cpu,cpuacct` on most systems).
pub fn read_cpu_stats_v1(path: &CGroupPath, cpuacct: &CGroupPath) -> Result<(CpuStats, f64)> {
    let stat_file = path.abs_path.join(CPU_STAT_FILE);
    let contents = fsutil::read_to_string(&stat_file)?;
    let stat = CpuStatV1::parse(&contents).map_err(|source| Error::Parse {
        path: stat_file,
        source,
    })?;
    let usage = read_cpuacct_usage(cpuacct)?;
    let limit = match read_cpu_limit_v1(path) {
        Ok(limit) => limit,
        Err(err) if err.is_not_found() => -1.0,
        Err(err) => return Err(err),
    };
    let stats = CpuStats {
        limit,
        usage,
        throttled: duration_from_nanos(stat.throttled_time),
    };
    Ok((stats, limit))
}

fn read_cpuacct_usage(path: &CGroupPath) -> Result<CpuTime> {
    match read_int_file(&path.abs_path.join(CPUACCT_USAGE_USER_FILE)) {
        Ok(user_ns) => {
            let sys_ns = read_int_file(&path.abs_path.join(CPUACCT_USAGE_SYS_FILE))?;
            Ok(CpuTime {
                utime: duration_from_nanos(user_ns),
                stime: duration_from_nanos(sys_ns),
            })
        }
        // Kernels predating the split usage files only expose tick
        // granularity via cpuacct.stat.
        Err(err) if err.is_not_found() => {
            let stat_file = path.abs_path.join(CPUACCT_STAT_FILE);
            let contents = fsutil::read_to_string(&stat_file)?;
            let stat = CpuacctStat::parse(&contents).map_err(|source| Error::Parse {
                path: stat_file,
                source,
            })?;
            let ns_per_tick = 1_000_000_000 / procfs::clock_ticks();
            Ok(CpuTime {
                utime: Duration::from_nanos(stat.user.max(0) as u64 * ns_per_tick),
                stime: Duration::from_nanos(stat.system.max(0) as u64 * ns_per_tick),
            })
        }
        Err(err) => Err(err),
    }
}

/// Reads CPU stats at one v2 cgroup level.
pub fn read_cpu_stats_v2(path: &CGroupPath) -> Result<(CpuStats, f64)> {
    let stat_file = path.abs_path.join(CPU_STAT_FILE);
    let contents = fsutil::read_to_string(&stat_file)?;
    let stat = CpuStatV2::parse(&contents).map_err(|source| Error::Parse {
        path: stat_file,
        source,
    })?;
    // The root cgroup carries cpu.stat but no cpu.max.
    let limit = match read_cpu_limit_v2(path) {
        Ok(limit) => limit,
        Err(err) if err.is_not_found() => -1.0,
        Err(err) => return Err(err),
    };
    let stats = CpuStats {
        limit,
        usage: CpuTime {
            utime: duration_from_micros(stat.user_usec),
            stime: duration_from_micros(stat.system_usec),
        },
        throttled: duration_from_micros(stat.throttled_usec),
    };
    Ok((stats, limit))
}

/// Effective CPU limit for the current process: the minimum positive
/// limit along its cgroup hierarchy, or `0` when nothing constrains it.
pub fn cpu_limit() -> Result<f64> {
    let leaf = resolver::self_subsystem_path("cpu")?;
    aggregate::walk_binding(leaf, |p| read_cpu_limit(p).map(|limit| (limit, limit)))
}

/// CPU usage and throttling of the cgroup whose limit binds the current
/// process, with the leaf's stats when nothing imposes a limit.
pub fn cpu_stats() -> Result<CpuStats> {
    let leaf = resolver::self_subsystem_path("cpu")?;
    match leaf.mode {
        Mode::V1 => {
            let cpuacct = resolver::self_subsystem_path("cpuacct")?;
            aggregate::walk_binding(leaf, move |p| read_cpu_stats_v1(p, &cpuacct))
        }
        Mode::V2 => aggregate::walk_binding(leaf, read_cpu_stats_v2),
        Mode::Unknown => Err(Error::UnknownMode {
            path: leaf.abs_path,
        }),
    }
}
