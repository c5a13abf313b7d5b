//! RSS and CPU-time accounting for a single process.

use std::path::Path;
use std::time::Duration;

use crate::fsutil;
use crate::stats::CpuTime;

use super::error::{Error, Result};
use super::{clock_ticks, page_size, proc_file, status};

/// Returns the resident set size of the process, in bytes.
///
/// Read from the second column of `/proc/<pid>/statm`, which counts
/// resident pages.
pub fn rss(pid: i32) -> Result<i64> {
    let path = proc_file(pid, "statm");
    let contents = fsutil::read_to_string(&path)?;
    parse_statm_rss(&path, &contents)
}

fn parse_statm_rss(path: &Path, contents: &str) -> Result<i64> {
    let resident = contents
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::MalformedStat {
            path: path.to_path_buf(),
            detail: "fewer than 2 fields",
        })?;
    let pages = resident
        .parse::<i64>()
        .map_err(|source| Error::BadInteger {
            path: path.to_path_buf(),
            value: resident.to_owned(),
            source,
        })?;
    Ok(pages * page_size())
}

/// Returns the cumulative CPU time of the process, including that of its
/// reaped (`wait(2)`ed-on) children.
///
/// Read from fields 14-17 of `/proc/<pid>/stat` (utime, stime, cutime,
/// cstime), which the kernel reports in scheduler ticks.
pub fn cpu_time(pid: i32) -> Result<CpuTime> {
    let path = proc_file(pid, "stat");
    let contents = fsutil::read_to_string(&path)?;
    parse_stat_cpu_time(&path, &contents)
}

fn parse_stat_cpu_time(path: &Path, contents: &str) -> Result<CpuTime> {
    // The comm field is parenthesized and may itself contain spaces and
    // parentheses; the fixed-format fields resume after the last `)`.
    let (_, after_comm) = contents
        .rsplit_once(')')
        .ok_or_else(|| Error::MalformedStat {
            path: path.to_path_buf(),
            detail: "no parenthesized comm field",
        })?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // after_comm starts at field 3 (state), so utime..cstime (fields
    // 14-17 of the file) are at indexes 11-14.
    if fields.len() < 15 {
        return Err(Error::MalformedStat {
            path: path.to_path_buf(),
            detail: "fewer than 17 fields",
        });
    }
    let parse = |value: &str| -> Result<i64> {
        value.parse::<i64>().map_err(|source| Error::BadInteger {
            path: path.to_path_buf(),
            value: value.to_owned(),
            source,
        })
    };
    let utime_ticks = parse(fields[11])?;
    let stime_ticks = parse(fields[12])?;
    let cutime_ticks = parse(fields[13])?;
    let cstime_ticks = parse(fields[14])?;

    let ns_per_tick = 1_000_000_000 / clock_ticks();
    let ticks_to_duration =
        |ticks: i64| Duration::from_nanos(ticks.max(0) as u64 * ns_per_tick);
    Ok(CpuTime {
        utime: ticks_to_duration(utime_ticks + cutime_ticks),
        stime: ticks_to_duration(stime_ticks + cstime_ticks),
    })
}

/// Returns the maximum RSS (high-water mark) of the process, in bytes.
pub fn max_rss(pid: i32) -> Result<i64> {
    Ok(status::read_status(pid)?.vm_hwm)
}

/// Resets the RSS high-water mark of the process to its current RSS.
///
/// From proc(5): writing `5` to `/proc/<pid>/clear_refs` resets the peak
/// resident set size. The file is write-only and writable only by the
/// owner of the process.
pub fn reset_max_rss(pid: i32) -> Result<()> {
    let path = proc_file(pid, "clear_refs");
    std::fs::write(&path, b"5").map_err(|source| Error::Write { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn parses_statm_resident_pages() {
        let path = Path::new("/proc/1/statm");
        let rss = parse_statm_rss(path, "1486 181 145 20 0 262 0\n").unwrap();
        assert_eq!(rss, 181 * page_size());
    }

    #[test]
    fn too_short_statm_is_malformed() {
        let path = Path::new("/proc/1/statm");
        let err = parse_statm_rss(path, "1486\n").unwrap_err();
        matches!(err, Error::MalformedStat { .. });
    }

    #[test]
    fn parses_stat_cpu_fields() {
        let path = Path::new("/proc/1/stat");
        let line = "19203 (cat) R 18836 19203 18836 34817 19203 4194304 103 0 0 0 \
                    150 50 25 75 20 0 1 0 468400 6086656 212 18446744073709551615 \
                    1 1 0 0 0 0 0 0 0 0 0 0 17 6 0 0 0 0 0\n";
        let time = parse_stat_cpu_time(path, line).unwrap();
        let tick = Duration::from_nanos(1_000_000_000 / clock_ticks());
        assert_eq!(time.utime, tick * (150 + 25));
        assert_eq!(time.stime, tick * (50 + 75));
    }

    #[test]
    fn comm_with_spaces_and_parens_is_handled() {
        let path = Path::new("/proc/1/stat");
        let line = "7 (tmux: ser) ver) S 1 7 7 0 -1 4194560 1 0 0 0 \
                    10 20 30 40 20 0 1 0 100 1000 10 18446744073709551615 \
                    1 1 0 0 0 0 0 0 0 0 0 0 17 2 0 0 0 0 0\n";
        let time = parse_stat_cpu_time(path, line).unwrap();
        let tick = Duration::from_nanos(1_000_000_000 / clock_ticks());
        assert_eq!(time.utime, tick * (10 + 30));
        assert_eq!(time.stime, tick * (20 + 40));
    }

    #[test]
    fn too_few_stat_fields_is_malformed() {
        let path = Path::new("/proc/1/stat");
        let err = parse_stat_cpu_time(path, "1 (init) S 0 1\n").unwrap_err();
        matches!(err, Error::MalformedStat { .. });
    }

    #[test]
    fn reads_own_rss() {
        let rss = rss(own_pid()).unwrap();
        assert!(rss > 0, "a running process has resident pages");
        assert_eq!(rss % page_size(), 0);
    }

    #[test]
    fn reads_own_cpu_time() {
        // Burn a little CPU so the counters cannot both be zero forever.
        let mut acc = 0u64;
        for i in 0..2_000_000u64 {
            acc = acc.wrapping_add(i * i);
        }
        std::hint::black_box(acc);
        let time = cpu_time(own_pid()).unwrap();
        assert!(time.utime + time.stime >= Duration::ZERO);
    }

    #[test]
    fn reads_own_max_rss() {
        // Read the current RSS first: the high-water mark read afterwards
        // can only be at or above it.
        let current = rss(own_pid()).unwrap();
        let hwm = max_rss(own_pid()).unwrap();
        assert!(hwm > 0);
        assert!(hwm >= current);
    }
}
