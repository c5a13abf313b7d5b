//! Memory limit and usage readers for cgroup v1 and v2.
//!
//! v1 exposes byte counters as one file per value (`memory.limit_in_bytes`,
//! `memory.usage_in_bytes`) with `memory.stat` and `memory.oom_control`
//! carrying the detail; v2 uses `memory.current`, `memory.max`, and moves
//! OOM accounting into `memory.events`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::fsutil;
use crate::kvparser::{Fallback, FieldSetter, KvFile, Schema};
use crate::stats::MemoryStats;

use super::aggregate;
use super::error::{Error, Result};
use super::path::{CGroupPath, Mode};
use super::read_int_file;
use super::resolver;

const MEM_LIMIT_FILE: &str = "memory.limit_in_bytes";
const MEM_USAGE_FILE: &str = "memory.usage_in_bytes";
const MEM_STAT_FILE: &str = "memory.stat";
const MEM_OOM_CONTROL_FILE: &str = "memory.oom_control";
const MEM_CURRENT_FILE: &str = "memory.current";
const MEM_MAX_FILE: &str = "memory.max";
const MEM_EVENTS_FILE: &str = "memory.events";

/// Fields of interest from a v1 `memory.stat` file. The `total_*`
/// variants are hierarchical sums over the cgroup and its descendants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStatV1 {
    pub cache: i64,
    pub rss: i64,
    pub rss_huge: i64,
    pub shmem: i64,
    pub mapped_file: i64,
    pub swap: i64,
    pub total_cache: i64,
    pub total_rss: i64,
    pub total_swap: i64,
    pub unknown: HashMap<String, i64>,
}

static MEMORY_STAT_V1_SCHEMA: LazyLock<Schema<MemoryStatV1>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("cache", FieldSetter::I64(|s: &mut MemoryStatV1, v| s.cache = v))
        .field("rss", FieldSetter::I64(|s, v| s.rss = v))
        .field("rss_huge", FieldSetter::I64(|s, v| s.rss_huge = v))
        .field("shmem", FieldSetter::I64(|s, v| s.shmem = v))
        .field("mapped_file", FieldSetter::I64(|s, v| s.mapped_file = v))
        .field("swap", FieldSetter::I64(|s, v| s.swap = v))
        .field("total_cache", FieldSetter::I64(|s, v| s.total_cache = v))
        .field("total_rss", FieldSetter::I64(|s, v| s.total_rss = v))
        .field("total_swap", FieldSetter::I64(|s, v| s.total_swap = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for MemoryStatV1 {
    fn schema() -> &'static Schema<Self> {
        &MEMORY_STAT_V1_SCHEMA
    }
}

/// The v1 `memory.oom_control` file. `oom_kill` only exists on kernels
/// 4.13 and newer; older kernels leave it at the zero default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryOomControl {
    pub oom_kill_disable: i64,
    pub under_oom: i64,
    pub oom_kill: i64,
    pub unknown: HashMap<String, i64>,
}

static OOM_CONTROL_SCHEMA: LazyLock<Schema<MemoryOomControl>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("oom_kill_disable", FieldSetter::I64(|s: &mut MemoryOomControl, v| s.oom_kill_disable = v))
        .field("under_oom", FieldSetter::I64(|s, v| s.under_oom = v))
        .field("oom_kill", FieldSetter::I64(|s, v| s.oom_kill = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for MemoryOomControl {
    fn schema() -> &'static Schema<Self> {
        &OOM_CONTROL_SCHEMA
    }
}

/// Fields of interest from a v2 `memory.stat` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStatV2 {
    pub anon: i64,
    pub file: i64,
    pub file_dirty: i64,
    pub file_writeback: i64,
    pub swapcached: i64,
    pub shmem: i64,
    pub slab: i64,
    pub slab_reclaimable: i64,
    pub unknown: HashMap<String, i64>,
}

static MEMORY_STAT_V2_SCHEMA: LazyLock<Schema<MemoryStatV2>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("anon", FieldSetter::I64(|s: &mut MemoryStatV2, v| s.anon = v))
        .field("file", FieldSetter::I64(|s, v| s.file = v))
        .field("file_dirty", FieldSetter::I64(|s, v| s.file_dirty = v))
        .field("file_writeback", FieldSetter::I64(|s, v| s.file_writeback = v))
        .field("swapcached", FieldSetter::I64(|s, v| s.swapcached = v))
        .field("shmem", FieldSetter::I64(|s, v| s.shmem = v))
        .field("slab", FieldSetter::I64(|s, v| s.slab = v))
        .field("slab_reclaimable", FieldSetter::I64(|s, v| s.slab_reclaimable = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for MemoryStatV2 {
    fn schema() -> &'static Schema<Self> {
        &MEMORY_STAT_V2_SCHEMA
    }
}

/// The v2 `memory.events` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryEvents {
    pub low: i64,
    pub high: i64,
    pub max: i64,
    pub oom: i64,
    pub oom_kill: i64,
    pub oom_group_kill: i64,
    pub unknown: HashMap<String, i64>,
}

static MEMORY_EVENTS_SCHEMA: LazyLock<Schema<MemoryEvents>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("low", FieldSetter::I64(|s: &mut MemoryEvents, v| s.low = v))
        .field("high", FieldSetter::I64(|s, v| s.high = v))
        .field("max", FieldSetter::I64(|s, v| s.max = v))
        .field("oom", FieldSetter::I64(|s, v| s.oom = v))
        .field("oom_kill", FieldSetter::I64(|s, v| s.oom_kill = v))
        .field("oom_group_kill", FieldSetter::I64(|s, v| s.oom_group_kill = v))
        .fallback(Fallback::I64(|s, k, v| {
            s.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for MemoryEvents {
    fn schema() -> &'static Schema<Self> {
        &MEMORY_EVENTS_SCHEMA
    }
}

/// Reads the memory limit imposed at one cgroup level, in bytes.
///
/// A v2 `memory.max` of `max` maps to `i64::MAX`, the "no limit"
/// sentinel; v1 expresses the same state as a page-rounded huge value of
/// its own making.
pub fn read_memory_limit(path: &CGroupPath) -> Result<i64> {
    match path.mode {
        Mode::V1 => read_int_file(&path.abs_path.join(MEM_LIMIT_FILE)),
        Mode::V2 => read_memory_max(&path.abs_path.join(MEM_MAX_FILE)),
        Mode::Unknown => Err(Error::UnknownMode {
            path: path.abs_path.clone(),
        }),
    }
}

fn read_memory_max(file: &Path) -> Result<i64> {
    let contents = fsutil::read_to_string(file)?;
    let value = contents.trim();
    if value == "max" {
        return Ok(i64::MAX);
    }
    value.parse::<i64>().map_err(|source| Error::BadInteger {
        path: file.to_path_buf(),
        value: value.to_owned(),
        source,
    })
}

/// Reads memory stats at one cgroup level, returning the stats and the
/// level's limit (`-1` when the limit is unknowable at this level).
pub fn read_memory_stats(path: &CGroupPath) -> Result<(MemoryStats, i64)> {
    match path.mode {
        Mode::V1 => read_memory_stats_v1(path),
        Mode::V2 => read_memory_stats_v2(path),
        Mode::Unknown => Err(Error::UnknownMode {
            path: path.abs_path.clone(),
        }),
    }
}

fn parse_kv_file<T: KvFile>(file: &Path) -> Result<T> {
    let contents = fsutil::read_to_string(file)?;
    T::parse(&contents).map_err(|source| Error::Parse {
        path: file.to_path_buf(),
        source,
    })
}

fn read_memory_stats_v1(path: &CGroupPath) -> Result<(MemoryStats, i64)> {
    let limit = read_int_file(&path.abs_path.join(MEM_LIMIT_FILE))?;
    let usage = read_int_file(&path.abs_path.join(MEM_USAGE_FILE))?;
    let stat: MemoryStatV1 = parse_kv_file(&path.abs_path.join(MEM_STAT_FILE))?;
    let oom: MemoryOomControl = parse_kv_file(&path.abs_path.join(MEM_OOM_CONTROL_FILE))?;

    let free = limit - usage;
    let stats = MemoryStats {
        total: limit,
        free,
        // Data in the page cache for the cgroup is reclaimable, so it
        // counts as available even though it is charged against the limit.
        available: free.saturating_add(stat.total_cache),
        oom_kills: oom.oom_kill,
    };
    Ok((stats, limit))
}

fn read_memory_stats_v2(path: &CGroupPath) -> Result<(MemoryStats, i64)> {
    let usage = read_int_file(&path.abs_path.join(MEM_CURRENT_FILE))?;
    let limit = match read_memory_max(&path.abs_path.join(MEM_MAX_FILE)) {
        Ok(limit) => limit,
        Err(err) if err.is_not_found() => -1,
        Err(err) => return Err(err),
    };
    let stat: MemoryStatV2 = parse_kv_file(&path.abs_path.join(MEM_STAT_FILE))?;
    // The root cgroup has no memory.events.
    let oom_kills = match parse_kv_file::<MemoryEvents>(&path.abs_path.join(MEM_EVENTS_FILE)) {
        Ok(events) => events.oom_group_kill,
        Err(err) if err.is_not_found() => 0,
        Err(err) => return Err(err),
    };

    let (total, free, available) = if limit < 0 {
        (-1, -1, -1)
    } else {
        let free = limit.saturating_sub(usage);
        // Clean page-cache data and reclaimable slab count as available.
        // Dirty and writeback pages are subtracted out; whether swapcached
        // double-counts against them is pinned by the tests below.
        let reclaimable = stat
            .swapcached
            .saturating_add(stat.file - stat.file_dirty - stat.file_writeback)
            .saturating_add(stat.slab_reclaimable);
        (limit, free, free.saturating_add(reclaimable))
    };
    let stats = MemoryStats {
        total,
        free,
        available,
        oom_kills,
    };
    Ok((stats, limit))
}

/// Effective memory limit for the current process: the minimum positive
/// limit along its cgroup hierarchy.
pub fn memory_limit() -> Result<i64> {
    let leaf = resolver::self_subsystem_path("memory")?;
    aggregate::walk_binding(leaf, |p| read_memory_limit(p).map(|limit| (limit, limit)))
}

/// Memory usage and OOM accounting of the cgroup whose limit binds the
/// current process, with the leaf's stats when nothing imposes a limit.
pub fn memory_stats() -> Result<MemoryStats> {
    let leaf = resolver::self_subsystem_path("memory")?;
    aggregate::walk_binding(leaf, read_memory_stats)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const GIB: i64 = 1 << 30;

    fn cgroup_dir(root: &Path, rel: &str, mode: Mode) -> CGroupPath {
        let abs_path = root.join(rel);
        fs::create_dir_all(&abs_path).unwrap();
        CGroupPath {
            abs_path,
            mount_path: root.to_path_buf(),
            mode,
        }
    }

    fn write_v2_level(cg: &CGroupPath, current: i64, max: &str, events: &str) {
        fs::write(cg.abs_path.join(MEM_CURRENT_FILE), format!("{current}\n")).unwrap();
        fs::write(cg.abs_path.join(MEM_MAX_FILE), format!("{max}\n")).unwrap();
        fs::write(
            cg.abs_path.join(MEM_STAT_FILE),
            "anon 1000\nfile 4096\nfile_dirty 1024\nfile_writeback 512\n\
             swapcached 256\nslab_reclaimable 2048\nslab 4096\n",
        )
        .unwrap();
        fs::write(cg.abs_path.join(MEM_EVENTS_FILE), events).unwrap();
    }

    #[test]
    fn parses_v1_memory_stat_totals() {
        let stat = MemoryStatV1::parse(
            "cache 2048\nrss 1024\ntotal_cache 4096\ntotal_rss 8192\npgfault 99\n",
        )
        .unwrap();
        assert_eq!(stat.cache, 2048);
        assert_eq!(stat.total_cache, 4096);
        assert_eq!(stat.total_rss, 8192);
        assert_eq!(stat.unknown["pgfault"], 99);
    }

    #[test]
    fn oom_kill_field_defaults_to_zero_on_old_kernels() {
        let oom = MemoryOomControl::parse("oom_kill_disable 0\nunder_oom 0\n").unwrap();
        assert_eq!(oom.oom_kill, 0);
    }

    #[test]
    fn memory_events_expose_group_kills() {
        let events =
            MemoryEvents::parse("low 0\nhigh 4\nmax 2\noom 1\noom_kill 1\noom_group_kill 1\n")
                .unwrap();
        assert_eq!(events.oom_group_kill, 1);
        assert_eq!(events.high, 4);
    }

    #[test]
    fn v2_max_sentinel_is_i64_max() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V2);
        fs::write(cg.abs_path.join(MEM_MAX_FILE), "max\n").unwrap();
        assert_eq!(read_memory_limit(&cg).unwrap(), i64::MAX);
    }

    #[test]
    fn v2_numeric_limit_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V2);
        fs::write(cg.abs_path.join(MEM_MAX_FILE), "2147483648\n").unwrap();
        assert_eq!(read_memory_limit(&cg).unwrap(), 2 * GIB);
    }

    #[test]
    fn v1_limit_reads_limit_in_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V1);
        fs::write(cg.abs_path.join(MEM_LIMIT_FILE), "1073741824\n").unwrap();
        assert_eq!(read_memory_limit(&cg).unwrap(), GIB);
    }

    #[test]
    fn v1_stats_derive_available_from_total_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V1);
        fs::write(cg.abs_path.join(MEM_LIMIT_FILE), format!("{GIB}\n")).unwrap();
        fs::write(cg.abs_path.join(MEM_USAGE_FILE), "536870912\n").unwrap();
        fs::write(
            cg.abs_path.join(MEM_STAT_FILE),
            "cache 1024\nrss 2048\ntotal_cache 268435456\ntotal_rss 4096\n",
        )
        .unwrap();
        fs::write(
            cg.abs_path.join(MEM_OOM_CONTROL_FILE),
            "oom_kill_disable 0\nunder_oom 0\noom_kill 3\n",
        )
        .unwrap();

        let (stats, limit) = read_memory_stats(&cg).unwrap();
        assert_eq!(limit, GIB);
        assert_eq!(stats.total, GIB);
        assert_eq!(stats.free, GIB / 2);
        assert_eq!(stats.available, GIB / 2 + GIB / 4);
        assert_eq!(stats.oom_kills, 3);
    }

    #[test]
    fn v2_stats_derive_available_from_reclaimable_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V2);
        write_v2_level(&cg, GIB / 2, &(2 * GIB).to_string(), "oom_group_kill 2\n");

        let (stats, limit) = read_memory_stats(&cg).unwrap();
        assert_eq!(limit, 2 * GIB);
        assert_eq!(stats.total, 2 * GIB);
        assert_eq!(stats.free, 2 * GIB - GIB / 2);
        // free + swapcached + (file - dirty - writeback) + slab_reclaimable
        assert_eq!(stats.available, stats.free + 256 + (4096 - 1024 - 512) + 2048);
        assert_eq!(stats.oom_kills, 2);
    }

    #[test]
    fn v2_stats_without_memory_max_report_unknown_totals() {
        let dir = tempfile::tempdir().unwrap();
        let cg = cgroup_dir(dir.path(), "slice", Mode::V2);
        fs::write(cg.abs_path.join(MEM_CURRENT_FILE), "4096\n").unwrap();
        fs::write(cg.abs_path.join(MEM_STAT_FILE), "file 0\n").unwrap();

        let (stats, limit) = read_memory_stats(&cg).unwrap();
        assert_eq!(limit, -1);
        assert_eq!(stats.total, -1);
        assert_eq!(stats.free, -1);
        assert_eq!(stats.available, -1);
    }

    #[test]
    fn nested_v2_limits_bind_at_the_tightest_level() {
        let dir = tempfile::tempdir().unwrap();
        let grand = cgroup_dir(dir.path(), "a", Mode::V2);
        let parent = cgroup_dir(dir.path(), "a/b", Mode::V2);
        let leaf = cgroup_dir(dir.path(), "a/b/c", Mode::V2);
        let root = cgroup_dir(dir.path(), "", Mode::V2);
        write_v2_level(&root, GIB, "max", "oom_group_kill 0\n");
        write_v2_level(&grand, GIB, &(8 * GIB).to_string(), "oom_group_kill 0\n");
        write_v2_level(&parent, GIB / 2, &(2 * GIB).to_string(), "oom_group_kill 7\n");
        write_v2_level(&leaf, GIB / 4, "max", "oom_group_kill 0\n");

        let stats = aggregate::walk_binding(leaf, read_memory_stats).unwrap();
        // The 2 GiB parent binds below the 8 GiB grandparent; its stats,
        // not the leaf's, are the answer.
        assert_eq!(stats.total, 2 * GIB);
        assert_eq!(stats.oom_kills, 7);
    }

    #[test]
    fn unconstrained_v2_walk_returns_leaf_stats() {
        let dir = tempfile::tempdir().unwrap();
        let parent = cgroup_dir(dir.path(), "a", Mode::V2);
        let leaf = cgroup_dir(dir.path(), "a/b", Mode::V2);
        let root = cgroup_dir(dir.path(), "", Mode::V2);
        write_v2_level(&root, GIB, "max", "oom_group_kill 0\n");
        write_v2_level(&parent, GIB / 2, "max", "oom_group_kill 0\n");
        write_v2_level(&leaf, GIB / 4, "max", "oom_group_kill 4\n");

        let stats = aggregate::walk_binding(leaf, read_memory_stats).unwrap();
        assert_eq!(stats.oom_kills, 4);
        assert_eq!(stats.free, i64::MAX - GIB / 4);
    }
}
