//! Host-level memory accounting from `/proc/meminfo` and `/proc/vmstat`.
//!
//! When a process runs outside any constraining cgroup (or its cgroup
//! limit exceeds physical memory), the host totals are the numbers that
//! matter. Swap is folded into the totals so that "free" reflects
//! everything the kernel could still hand out.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::fsutil;
use crate::kvparser::{Fallback, FieldSetter, KvFile, Schema};
use crate::stats::MemoryStats;

const MEMINFO_PATH: &str = "/proc/meminfo";
const VMSTAT_PATH: &str = "/proc/vmstat";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::ReadFileError),

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: crate::kvparser::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Typed fields of `/proc/meminfo`. Values are bytes (the file's `kB`
/// suffix is applied during parsing); keys this build has never seen go
/// to `unknown`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total: i64,
    pub mem_free: i64,
    pub mem_available: i64,
    pub buffers: i64,
    pub cached: i64,
    pub swap_cached: i64,
    pub active: i64,
    pub inactive: i64,
    pub unevictable: i64,
    pub mlocked: i64,
    pub swap_total: i64,
    pub swap_free: i64,
    pub dirty: i64,
    pub writeback: i64,
    pub anon_pages: i64,
    pub mapped: i64,
    pub shmem: i64,
    pub kreclaimable: i64,
    pub slab: i64,
    pub sreclaimable: i64,
    pub sunreclaim: i64,
    pub kernel_stack: i64,
    pub page_tables: i64,
    pub commit_limit: i64,
    pub committed_as: i64,
    pub unknown: HashMap<String, i64>,
}

static MEMINFO_SCHEMA: LazyLock<Schema<MemInfo>> = LazyLock::new(|| {
    Schema::builder(":")
        .field("MemTotal", FieldSetter::I64(|m: &mut MemInfo, v| m.mem_total = v))
        .field("MemFree", FieldSetter::I64(|m, v| m.mem_free = v))
        .field("MemAvailable", FieldSetter::I64(|m, v| m.mem_available = v))
        .field("Buffers", FieldSetter::I64(|m, v| m.buffers = v))
        .field("Cached", FieldSetter::I64(|m, v| m.cached = v))
        .field("SwapCached", FieldSetter::I64(|m, v| m.swap_cached = v))
        .field("Active", FieldSetter::I64(|m, v| m.active = v))
        .field("Inactive", FieldSetter::I64(|m, v| m.inactive = v))
        .field("Unevictable", FieldSetter::I64(|m, v| m.unevictable = v))
        .field("Mlocked", FieldSetter::I64(|m, v| m.mlocked = v))
        .field("SwapTotal", FieldSetter::I64(|m, v| m.swap_total = v))
        .field("SwapFree", FieldSetter::I64(|m, v| m.swap_free = v))
        .field("Dirty", FieldSetter::I64(|m, v| m.dirty = v))
        .field("Writeback", FieldSetter::I64(|m, v| m.writeback = v))
        .field("AnonPages", FieldSetter::I64(|m, v| m.anon_pages = v))
        .field("Mapped", FieldSetter::I64(|m, v| m.mapped = v))
        .field("Shmem", FieldSetter::I64(|m, v| m.shmem = v))
        .field("KReclaimable", FieldSetter::I64(|m, v| m.kreclaimable = v))
        .field("Slab", FieldSetter::I64(|m, v| m.slab = v))
        .field("SReclaimable", FieldSetter::I64(|m, v| m.sreclaimable = v))
        .field("SUnreclaim", FieldSetter::I64(|m, v| m.sunreclaim = v))
        .field("KernelStack", FieldSetter::I64(|m, v| m.kernel_stack = v))
        .field("PageTables", FieldSetter::I64(|m, v| m.page_tables = v))
        .field("CommitLimit", FieldSetter::I64(|m, v| m.commit_limit = v))
        .field("Committed_AS", FieldSetter::I64(|m, v| m.committed_as = v))
        .fallback(Fallback::I64(|m, k, v| {
            m.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for MemInfo {
    fn schema() -> &'static Schema<Self> {
        &MEMINFO_SCHEMA
    }
}

/// Typed fields of `/proc/vmstat` (page counts and event counters; only
/// the counters this crate reports are declared).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmStat {
    pub nr_free_pages: i64,
    pub nr_dirty: i64,
    pub nr_writeback: i64,
    pub pgpgin: i64,
    pub pgpgout: i64,
    pub pswpin: i64,
    pub pswpout: i64,
    pub pgfault: i64,
    pub pgmajfault: i64,
    pub oom_kill: i64,
    pub unknown: HashMap<String, i64>,
}

static VMSTAT_SCHEMA: LazyLock<Schema<VmStat>> = LazyLock::new(|| {
    Schema::builder(" ")
        .field("nr_free_pages", FieldSetter::I64(|m: &mut VmStat, v| m.nr_free_pages = v))
        .field("nr_dirty", FieldSetter::I64(|m, v| m.nr_dirty = v))
        .field("nr_writeback", FieldSetter::I64(|m, v| m.nr_writeback = v))
        .field("pgpgin", FieldSetter::I64(|m, v| m.pgpgin = v))
        .field("pgpgout", FieldSetter::I64(|m, v| m.pgpgout = v))
        .field("pswpin", FieldSetter::I64(|m, v| m.pswpin = v))
        .field("pswpout", FieldSetter::I64(|m, v| m.pswpout = v))
        .field("pgfault", FieldSetter::I64(|m, v| m.pgfault = v))
        .field("pgmajfault", FieldSetter::I64(|m, v| m.pgmajfault = v))
        .field("oom_kill", FieldSetter::I64(|m, v| m.oom_kill = v))
        .fallback(Fallback::I64(|m, k, v| {
            m.unknown.insert(k.to_owned(), v);
        }))
        .build()
});

impl KvFile for VmStat {
    fn schema() -> &'static Schema<Self> {
        &VMSTAT_SCHEMA
    }
}

fn parse_file<T: KvFile>(path: &Path) -> Result<T> {
    let contents = fsutil::read_to_string(path)?;
    T::parse(&contents).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses `/proc/meminfo`.
pub fn meminfo() -> Result<MemInfo> {
    parse_file(Path::new(MEMINFO_PATH))
}

/// Reads and parses `/proc/vmstat`.
pub fn vmstat() -> Result<VmStat> {
    parse_file(Path::new(VMSTAT_PATH))
}

/// Synthesizes host-wide [`MemoryStats`] from `/proc/meminfo` and
/// `/proc/vmstat`.
pub fn memory_stats() -> Result<MemoryStats> {
    let mi = meminfo()?;
    let vms = vmstat()?;
    Ok(MemoryStats {
        total: mi.mem_total + mi.swap_total,
        free: mi.mem_free + mi.swap_free,
        available: mi.mem_available,
        oom_kills: vms.oom_kill,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meminfo_fixture() {
        let contents = "\
MemTotal:       16337536 kB
MemFree:         5422096 kB
MemAvailable:   11632080 kB
Buffers:          524424 kB
Cached:          5715612 kB
SwapCached:            0 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
Dirty:               792 kB
Writeback:             0 kB
Slab:             728240 kB
SReclaimable:     519448 kB
SUnreclaim:       208792 kB
VmallocTotal:   34359738367 kB
HugePages_Total:       0
";
        let mi = MemInfo::parse(contents).unwrap();
        assert_eq!(mi.mem_total, 16_337_536 * 1024);
        assert_eq!(mi.mem_available, 11_632_080 * 1024);
        assert_eq!(mi.swap_total, 2_097_148 * 1024);
        assert_eq!(mi.dirty, 792 * 1024);
        // Undeclared keys keep their scaling and land in the map.
        assert_eq!(mi.unknown["VmallocTotal"], 34_359_738_367 * 1024);
        assert_eq!(mi.unknown["HugePages_Total"], 0);
    }

    #[test]
    fn parses_vmstat_fixture() {
        let contents = "\
nr_free_pages 1355504
nr_dirty 198
pgpgin 5864171
pgpgout 12999035
pswpin 0
pswpout 0
pgfault 115479141
pgmajfault 10676
oom_kill 2
compact_stall 5
";
        let vms = VmStat::parse(contents).unwrap();
        assert_eq!(vms.nr_free_pages, 1_355_504);
        assert_eq!(vms.oom_kill, 2);
        assert_eq!(vms.pgmajfault, 10_676);
        assert_eq!(vms.unknown["compact_stall"], 5);
    }

    #[test]
    fn synthesizes_stats_with_swap_folded_in() {
        let mi = MemInfo::parse(
            "MemTotal: 100 kB\nMemFree: 40 kB\nMemAvailable: 60 kB\n\
             SwapTotal: 50 kB\nSwapFree: 50 kB\n",
        )
        .unwrap();
        assert_eq!(mi.mem_total + mi.swap_total, 150 * 1024);
        assert_eq!(mi.mem_free + mi.swap_free, 90 * 1024);
    }

    #[test]
    fn reads_live_host_stats() {
        let stats = memory_stats().unwrap();
        assert!(stats.total > 0);
        assert!(stats.free >= 0);
        assert!(stats.available >= 0);
        assert!(stats.oom_kills >= 0);
    }
}
