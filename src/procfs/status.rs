//! The `/proc/<pid>/status` typed record.
//!
//! The status file is the human-readable process summary: identity,
//! memory accounting (with `kB`-suffixed values, scaled to bytes here),
//! signal masks, and scheduler counters. Fields whose values are lists or
//! bitmasks stay textual; the namespace ID columns (`NStgid` and
//! friends) hold one entry per nested namespace and are textual for the
//! same reason.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::fsutil;
use crate::kvparser::{Fallback, FieldSetter, KvFile, Schema};

use super::error::{Error, Result};
use super::proc_file;

/// Parsed contents of `/proc/<pid>/status`. Byte counts are bytes (the
/// file's `kB` suffix is applied during parsing); unknown keys land in
/// `unknown` untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStatus {
    pub name: String,
    pub umask: u16,
    pub state: String,
    pub tgid: u64,
    pub ngid: u64,
    pub pid: u64,
    pub ppid: u64,
    pub tracer_pid: u64,
    pub uid: String,
    pub gid: String,
    pub fd_size: i64,
    pub groups: String,
    pub ns_tgid: String,
    pub ns_pid: String,
    pub ns_pgid: String,
    pub ns_sid: String,
    pub vm_peak: i64,
    pub vm_size: i64,
    pub vm_lck: i64,
    pub vm_pin: i64,
    pub vm_hwm: i64,
    pub vm_rss: i64,
    pub rss_anon: i64,
    pub rss_file: i64,
    pub rss_shmem: i64,
    pub vm_data: i64,
    pub vm_stk: i64,
    pub vm_exe: i64,
    pub vm_lib: i64,
    pub vm_pte: i64,
    pub vm_swap: i64,
    pub hugetlb_pages: i64,
    pub core_dumping: i64,
    pub threads: i64,
    pub sig_q: String,
    pub sig_pnd: String,
    pub shd_pnd: String,
    pub sig_blk: String,
    pub sig_ign: String,
    pub sig_cgt: String,
    pub cap_inh: String,
    pub cap_prm: String,
    pub cap_eff: String,
    pub cap_bnd: String,
    pub cap_amb: String,
    pub no_new_privs: String,
    pub seccomp: String,
    pub speculation_store_bypass: String,
    pub cpus_allowed: String,
    pub cpus_allowed_list: String,
    pub mems_allowed: String,
    pub mems_allowed_list: String,
    pub voluntary_ctxt_switches: i64,
    pub nonvoluntary_ctxt_switches: i64,
    pub unknown: HashMap<String, String>,
}

static STATUS_SCHEMA: LazyLock<Schema<ProcStatus>> = LazyLock::new(|| {
    Schema::builder(":")
        .field("Name", FieldSetter::Text(|s: &mut ProcStatus, v| s.name = v.to_owned()))
        .field("Umask", FieldSetter::U16(|s, v| s.umask = v))
        .field("State", FieldSetter::Text(|s, v| s.state = v.to_owned()))
        .field("Tgid", FieldSetter::U64(|s, v| s.tgid = v))
        .field("Ngid", FieldSetter::U64(|s, v| s.ngid = v))
        .field("Pid", FieldSetter::U64(|s, v| s.pid = v))
        .field("PPid", FieldSetter::U64(|s, v| s.ppid = v))
        .field("TracerPid", FieldSetter::U64(|s, v| s.tracer_pid = v))
        .field("Uid", FieldSetter::Text(|s, v| s.uid = v.to_owned()))
        .field("Gid", FieldSetter::Text(|s, v| s.gid = v.to_owned()))
        .field("FDSize", FieldSetter::I64(|s, v| s.fd_size = v))
        .field("Groups", FieldSetter::Text(|s, v| s.groups = v.to_owned()))
        .field("NStgid", FieldSetter::Text(|s, v| s.ns_tgid = v.to_owned()))
        .field("NSpid", FieldSetter::Text(|s, v| s.ns_pid = v.to_owned()))
        .field("NSpgid", FieldSetter::Text(|s, v| s.ns_pgid = v.to_owned()))
        .field("NSsid", FieldSetter::Text(|s, v| s.ns_sid = v.to_owned()))
        .field("VmPeak", FieldSetter::I64(|s, v| s.vm_peak = v))
        .field("VmSize", FieldSetter::I64(|s, v| s.vm_size = v))
        .field("VmLck", FieldSetter::I64(|s, v| s.vm_lck = v))
        .field("VmPin", FieldSetter::I64(|s, v| s.vm_pin = v))
        .field("VmHWM", FieldSetter::I64(|s, v| s.vm_hwm = v))
        .field("VmRSS", FieldSetter::I64(|s, v| s.vm_rss = v))
        .field("RssAnon", FieldSetter::I64(|s, v| s.rss_anon = v))
        .field("RssFile", FieldSetter::I64(|s, v| s.rss_file = v))
        .field("RssShmem", FieldSetter::I64(|s, v| s.rss_shmem = v))
        .field("VmData", FieldSetter::I64(|s, v| s.vm_data = v))
        .field("VmStk", FieldSetter::I64(|s, v| s.vm_stk = v))
        .field("VmExe", FieldSetter::I64(|s, v| s.vm_exe = v))
        .field("VmLib", FieldSetter::I64(|s, v| s.vm_lib = v))
        .field("VmPTE", FieldSetter::I64(|s, v| s.vm_pte = v))
        .field("VmSwap", FieldSetter::I64(|s, v| s.vm_swap = v))
        .field("HugetlbPages", FieldSetter::I64(|s, v| s.hugetlb_pages = v))
        .field("CoreDumping", FieldSetter::I64(|s, v| s.core_dumping = v))
        .field("Threads", FieldSetter::I64(|s, v| s.threads = v))
        .field("SigQ", FieldSetter::Text(|s, v| s.sig_q = v.to_owned()))
        .field("SigPnd", FieldSetter::Text(|s, v| s.sig_pnd = v.to_owned()))
        .field("ShdPnd", FieldSetter::Text(|s, v| s.shd_pnd = v.to_owned()))
        .field("SigBlk", FieldSetter::Text(|s, v| s.sig_blk = v.to_owned()))
        .field("SigIgn", FieldSetter::Text(|s, v| s.sig_ign = v.to_owned()))
        .field("SigCgt", FieldSetter::Text(|s, v| s.sig_cgt = v.to_owned()))
        .field("CapInh", FieldSetter::Text(|s, v| s.cap_inh = v.to_owned()))
        .field("CapPrm", FieldSetter::Text(|s, v| s.cap_prm = v.to_owned()))
        .field("CapEff", FieldSetter::Text(|s, v| s.cap_eff = v.to_owned()))
        .field("CapBnd", FieldSetter::Text(|s, v| s.cap_bnd = v.to_owned()))
        .field("CapAmb", FieldSetter::Text(|s, v| s.cap_amb = v.to_owned()))
        .field("NoNewPrivs", FieldSetter::Text(|s, v| s.no_new_privs = v.to_owned()))
        .field("Seccomp", FieldSetter::Text(|s, v| s.seccomp = v.to_owned()))
        .field(
            "Speculation_Store_Bypass",
            FieldSetter::Text(|s, v| s.speculation_store_bypass = v.to_owned()),
        )
        .field("Cpus_allowed", FieldSetter::Text(|s, v| s.cpus_allowed = v.to_owned()))
        .field(
            "Cpus_allowed_list",
            FieldSetter::Text(|s, v| s.cpus_allowed_list = v.to_owned()),
        )
        .field("Mems_allowed", FieldSetter::Text(|s, v| s.mems_allowed = v.to_owned()))
        .field(
            "Mems_allowed_list",
            FieldSetter::Text(|s, v| s.mems_allowed_list = v.to_owned()),
        )
        .field(
            "voluntary_ctxt_switches",
            FieldSetter::I64(|s, v| s.voluntary_ctxt_switches = v),
        )
        .field(
            "nonvoluntary_ctxt_switches",
            FieldSetter::I64(|s, v| s.nonvoluntary_ctxt_switches = v),
        )
        .fallback(Fallback::Text(|s, k, v| {
            s.unknown.insert(k.to_owned(), v.to_owned());
        }))
        .build()
});

impl KvFile for ProcStatus {
    fn schema() -> &'static Schema<Self> {
        &STATUS_SCHEMA
    }
}

/// Reads and parses `/proc/<pid>/status`.
///
/// Portable callers usually want the higher-level wrappers
/// ([`super::rss`], [`super::max_rss`], [`super::cpu_time`]) instead of
/// the raw record.
pub fn read_status(pid: i32) -> Result<ProcStatus> {
    let path = proc_file(pid, "status");
    let contents = fsutil::read_to_string(&path)?;
    ProcStatus::parse(&contents).map_err(|source| Error::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Name:\tcat
Umask:\t0022
State:\tR (running)
Tgid:\t19203
Ngid:\t0
Pid:\t19203
PPid:\t18836
TracerPid:\t0
Uid:\t1000\t1000\t1000\t1000
Gid:\t1000\t1000\t1000\t1000
FDSize:\t256
Groups:\t10 18 27 1000
NStgid:\t19203
NSpid:\t19203
NSpgid:\t19203
NSsid:\t18836
VmPeak:\t    5944 kB
VmSize:\t    5944 kB
VmLck:\t       0 kB
VmPin:\t       0 kB
VmHWM:\t     848 kB
VmRSS:\t     848 kB
RssAnon:\t      88 kB
RssFile:\t     760 kB
RssShmem:\t       0 kB
VmData:\t     316 kB
VmStk:\t     132 kB
VmExe:\t      20 kB
VmLib:\t    1636 kB
VmPTE:\t      56 kB
VmSwap:\t       0 kB
HugetlbPages:\t       0 kB
CoreDumping:\t0
Threads:\t1
SigQ:\t0/62447
SigPnd:\t0000000000000000
ShdPnd:\t0000000000000000
SigBlk:\t0000000000000000
SigIgn:\t0000000000000000
SigCgt:\t0000000000000000
CapInh:\t0000000000000000
CapPrm:\t0000000000000000
CapEff:\t0000000000000000
CapBnd:\t0000003fffffffff
CapAmb:\t0000000000000000
NoNewPrivs:\t0
Seccomp:\t0
Speculation_Store_Bypass:\tthread vulnerable
Cpus_allowed:\tff
Cpus_allowed_list:\t0-7
Mems_allowed:\t1
Mems_allowed_list:\t0
voluntary_ctxt_switches:\t0
nonvoluntary_ctxt_switches:\t2
";

    #[test]
    fn parses_full_status_file() {
        let status = ProcStatus::parse(SAMPLE).unwrap();
        assert_eq!(status.name, "cat");
        assert_eq!(status.umask, 22);
        assert_eq!(status.state, "R (running)");
        assert_eq!(status.pid, 19203);
        assert_eq!(status.ppid, 18836);
        assert_eq!(status.uid, "1000\t1000\t1000\t1000");
        assert_eq!(status.threads, 1);
        assert_eq!(status.speculation_store_bypass, "thread vulnerable");
        assert_eq!(status.nonvoluntary_ctxt_switches, 2);
        assert!(status.unknown.is_empty());
    }

    #[test]
    fn kb_values_are_scaled_to_bytes() {
        let status = ProcStatus::parse(SAMPLE).unwrap();
        assert_eq!(status.vm_rss, 848 * 1024);
        assert_eq!(status.vm_hwm, 848 * 1024);
        assert_eq!(status.vm_peak, 5944 * 1024);
        assert_eq!(status.rss_file, 760 * 1024);
    }

    #[test]
    fn unknown_keys_are_collected_textually() {
        let status = ProcStatus::parse("Name:\tx\nTHP_enabled:\t1\n").unwrap();
        assert_eq!(status.unknown["THP_enabled"], "1");
    }

    #[test]
    fn reads_own_status() {
        let status = read_status(std::process::id() as i32).unwrap();
        assert_eq!(status.pid, std::process::id() as u64);
        assert!(status.vm_rss > 0);
        assert!(!status.name.is_empty());
    }
}
