//! Cgroup mount discovery from `/proc/self/mountinfo`.
//!
//! The mount table is the only place the kernel reveals *where* each cgroup
//! hierarchy is observable from the reading process's mount namespace, and
//! which v1 controllers a given mount carries. This module filters the
//! table down to `cgroup` and `cgroup2` mounts and decodes the
//! octal-escaped path fields.

mod escape;
mod error;
mod parser;

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use crate::fsutil;

pub use error::{Error, Result};

const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// A cgroup or cgroup2 mount.
///
/// `subsystems` is empty when the mount is a unified (v2) hierarchy; in
/// that case `cgroup_v2` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Where the mount is attached, as seen by this process.
    pub mountpoint: PathBuf,
    /// Root of the mount inside the cgroup filesystem. `/` unless a
    /// sub-hierarchy was bind-mounted.
    pub root: PathBuf,
    /// v1 controllers bound to this mount, in kernel emission order,
    /// including `name=<foo>` named hierarchies.
    pub subsystems: Vec<String>,
    /// Whether this is a `cgroup2` mount.
    pub cgroup_v2: bool,
}

impl Mount {
    /// Whether the mount's root lies outside the reading process's cgroup
    /// namespace. From cgroup_namespaces(7): such roots render as `/..`
    /// ancestor entries and cannot be resolved against `/proc/<pid>/cgroup`
    /// paths.
    pub(crate) fn outside_namespace(&self) -> bool {
        use std::os::unix::ffi::OsStrExt;
        self.root.as_os_str().as_bytes().starts_with(b"/..")
    }
}

/// Parses `/proc/self/mountinfo` and returns all cgroup and cgroup2 mounts
/// in file order.
pub fn cgroup_mounts() -> Result<Vec<Mount>> {
    let contents = fsutil::read_to_string(MOUNTINFO_PATH)?;
    cgroup_mounts_from_str(&contents)
}

/// Extracts cgroup mounts from mountinfo contents.
///
/// Non-cgroup lines are skipped; structurally invalid lines are an error.
/// The `ro`/`rw` tokens in the superblock options only reflect the original
/// mount (not later bind-mount layering) and are never reported as
/// subsystems.
pub fn cgroup_mounts_from_str(contents: &str) -> Result<Vec<Mount>> {
    let mut out = Vec::new();
    for line in contents.split('\n') {
        if line.is_empty() {
            continue;
        }
        let parsed = parser::parse_line(line)?;
        let cgroup_v2 = match parsed.fs_type {
            "cgroup" => false,
            "cgroup2" => true,
            _ => continue,
        };

        let mountpoint = unescape_path("mountpoint", parsed.mount_point)?;
        let root = unescape_path("root", parsed.root)?;
        let subsystems = if cgroup_v2 {
            Vec::new()
        } else {
            parsed
                .super_options
                .split(',')
                .filter(|opt| !matches!(*opt, "" | "ro" | "rw"))
                .map(str::to_owned)
                .collect()
        };

        out.push(Mount {
            mountpoint,
            root,
            subsystems,
            cgroup_v2,
        });
    }
    Ok(out)
}

fn unescape_path(field: &'static str, raw: &str) -> Result<PathBuf> {
    let bytes = escape::unescape_octal(raw).map_err(|source| Error::Escape {
        field,
        value: raw.to_owned(),
        source,
    })?;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subsystems(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn gentoo_hybrid_mount_table() {
        let gentoo = "\
26 34 0:5 / /proc rw,nosuid,nodev,noexec,relatime - proc proc rw
27 34 0:25 / /sys rw,nosuid,nodev,noexec,relatime - sysfs sysfs rw
28 34 0:6 / /dev rw,nosuid - devtmpfs devtmpfs rw,size=10240k,nr_inodes=2526523,mode=755
31 34 0:28 / /run rw,nosuid,nodev,noexec - tmpfs tmpfs rw,mode=755
44 27 0:32 / /sys/fs/cgroup rw,nosuid,nodev,noexec,relatime - tmpfs cgroup_root rw,size=10240k,mode=755
45 44 0:33 / /sys/fs/cgroup/openrc rw,nosuid,nodev,noexec,relatime - cgroup openrc rw,release_agent=/lib/rc/sh/cgroup-release-agent.sh,name=openrc
46 44 0:34 / /sys/fs/cgroup/unified rw,nosuid,nodev,noexec,relatime - cgroup2 none rw,nsdelegate
47 44 0:35 / /sys/fs/cgroup/cpuset rw,nosuid,nodev,noexec,relatime - cgroup cpuset rw,cpuset
48 44 0:36 / /sys/fs/cgroup/cpu rw,nosuid,nodev,noexec,relatime - cgroup cpu rw,cpu
49 44 0:37 / /sys/fs/cgroup/cpuacct rw,nosuid,nodev,noexec,relatime - cgroup cpuacct rw,cpuacct
50 44 0:38 / /sys/fs/cgroup/blkio rw,nosuid,nodev,noexec,relatime - cgroup blkio rw,blkio
51 44 0:39 / /sys/fs/cgroup/memory rw,nosuid,nodev,noexec,relatime - cgroup memory rw,memory
52 44 0:40 / /sys/fs/cgroup/devices rw,nosuid,nodev,noexec,relatime - cgroup devices rw,devices
53 44 0:41 / /sys/fs/cgroup/freezer rw,nosuid,nodev,noexec,relatime - cgroup freezer rw,freezer
54 44 0:42 / /sys/fs/cgroup/net_cls rw,nosuid,nodev,noexec,relatime - cgroup net_cls rw,net_cls
55 44 0:43 / /sys/fs/cgroup/perf_event rw,nosuid,nodev,noexec,relatime - cgroup perf_event rw,perf_event
61 34 259:2 / /boot rw,relatime - ext2 /dev/nvme0n1p2 rw,errors=continue,user_xattr,acl
63 34 0:49 / /tmp rw,nodev,relatime - tmpfs tmpfs rw,size=4194304k
";
        let mounts = cgroup_mounts_from_str(gentoo).unwrap();
        assert_eq!(mounts.len(), 11);

        assert_eq!(
            mounts[0],
            Mount {
                mountpoint: PathBuf::from("/sys/fs/cgroup/openrc"),
                root: PathBuf::from("/"),
                subsystems: subsystems(&[
                    "release_agent=/lib/rc/sh/cgroup-release-agent.sh",
                    "name=openrc",
                ]),
                cgroup_v2: false,
            }
        );
        assert_eq!(
            mounts[1],
            Mount {
                mountpoint: PathBuf::from("/sys/fs/cgroup/unified"),
                root: PathBuf::from("/"),
                subsystems: vec![],
                cgroup_v2: true,
            }
        );

        // The remaining nine are single-controller v1 mounts whose
        // controller matches the mountpoint suffix.
        for mount in &mounts[2..] {
            assert!(!mount.cgroup_v2);
            assert_eq!(mount.subsystems.len(), 1);
            let suffix = mount.mountpoint.file_name().unwrap().to_str().unwrap();
            assert_eq!(mount.subsystems[0], suffix);
        }
    }

    #[test]
    fn bind_mounted_subtree_roots_are_preserved() {
        let minikube = "\
2824 2823 0:282 / /sys/fs/cgroup ro,nosuid,nodev,noexec,relatime - tmpfs tmpfs rw,mode=755
2832 2824 0:30 /kubepods/podd05ceb29/db332e7610 /sys/fs/cgroup/memory ro,nosuid,nodev,noexec,relatime master:17 - cgroup cgroup rw,memory
2833 2824 0:31 /kubepods/podd05ceb29/db332e7610 /sys/fs/cgroup/cpu,cpuacct ro,nosuid,nodev,noexec,relatime master:18 - cgroup cgroup rw,cpu,cpuacct
2846 2838 0:30 / /mnt/cgroups/memory rw,nosuid,nodev,noexec,relatime master:17 - cgroup cgroup rw,memory
";
        let mounts = cgroup_mounts_from_str(minikube).unwrap();
        assert_eq!(mounts.len(), 3);
        assert_eq!(
            mounts[0].root,
            PathBuf::from("/kubepods/podd05ceb29/db332e7610")
        );
        assert_eq!(mounts[0].subsystems, subsystems(&["memory"]));
        assert_eq!(mounts[1].subsystems, subsystems(&["cpu", "cpuacct"]));
        assert_eq!(mounts[2].root, PathBuf::from("/"));
    }

    #[test]
    fn ro_rw_tokens_never_reported_as_subsystems() {
        let table = "\
51 44 0:39 / /sys/fs/cgroup/memory ro,nosuid - cgroup memory ro,memory
";
        let mounts = cgroup_mounts_from_str(table).unwrap();
        assert_eq!(mounts[0].subsystems, subsystems(&["memory"]));
    }

    #[test]
    fn octal_escaped_mountpoint_is_decoded() {
        let table = "\
51 44 0:39 / /sys/fs/cgroup/with\\040space rw - cgroup memory rw,memory
";
        let mounts = cgroup_mounts_from_str(table).unwrap();
        assert_eq!(
            mounts[0].mountpoint,
            PathBuf::from("/sys/fs/cgroup/with space")
        );
    }

    #[test]
    fn invalid_line_is_an_error() {
        let err = cgroup_mounts_from_str("garbage line without separator\n").unwrap_err();
        matches!(err, Error::Parse(_));
    }

    #[test]
    fn namespace_detection_matches_dotdot_roots() {
        let outside = Mount {
            mountpoint: PathBuf::from("/mnt/cgroups/unified"),
            root: PathBuf::from("/../../.."),
            subsystems: vec![],
            cgroup_v2: true,
        };
        assert!(outside.outside_namespace());

        let inside = Mount {
            mountpoint: PathBuf::from("/sys/fs/cgroup/unified"),
            root: PathBuf::from("/"),
            subsystems: vec![],
            cgroup_v2: true,
        };
        assert!(!inside.outside_namespace());
    }
}
