//! Mountinfo line parser for Linux systems.
//!
//! Parses lines in `/proc/[pid]/mountinfo` format. See
//! [`proc_pid_mountinfo(5)`](https://man7.org/linux/man-pages/man5/proc_pid_mountinfo.5.html)
//! for details on the structure. Only the fields the cgroup mount reader
//! consumes are retained; the identity fields and the variable-length
//! optional-field list are validated positionally and discarded.

/// The subset of a mountinfo line needed to locate a cgroup mount.
///
/// All fields borrow from the input line and are still octal-escaped.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct MountInfoLine<'a> {
    /// Root of the mount within the source filesystem (4th field).
    pub root: &'a str,
    /// Mount point relative to the process's root (5th field).
    pub mount_point: &'a str,
    /// Filesystem type (e.g. `cgroup`, `cgroup2`), first post-separator field.
    pub fs_type: &'a str,
    /// Per-superblock options, third post-separator field.
    pub super_options: &'a str,
}

/// Errors that may occur when parsing a mountinfo line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing separator ` - ` in line: `{0}`")]
    MissingSeparator(String),

    #[error("missing `{field}` field in line: `{line}`")]
    MissingField { field: &'static str, line: String },
}

/// Parses a single line of mountinfo data.
///
/// The line must follow the kernel format: five-plus whitespace-separated
/// fields, an optional-field list terminated by ` - `, then filesystem
/// type, source, and superblock options.
///
/// # Errors
///
/// Returns [`ParseError`] variants for a missing separator or missing
/// required fields.
pub(super) fn parse_line(line: &str) -> Result<MountInfoLine<'_>, ParseError> {
    let (pre, post) = line
        .split_once(" - ")
        .ok_or_else(|| ParseError::MissingSeparator(line.to_owned()))?;

    let mut pre_fields = pre.split_whitespace();
    let missing = |field: &'static str| ParseError::MissingField {
        field,
        line: line.to_owned(),
    };
    // Fields 1-3 are mount id, parent id, and major:minor; their values are
    // irrelevant here but their presence is structural.
    let root = pre_fields.nth(3).ok_or_else(|| missing("root"))?;
    let mount_point = pre_fields.next().ok_or_else(|| missing("mount point"))?;

    let mut post_fields = post.split_whitespace();
    let fs_type = post_fields.next().ok_or_else(|| missing("fs type"))?;
    let _source = post_fields.next().ok_or_else(|| missing("source"))?;
    let super_options = post_fields
        .next()
        .ok_or_else(|| missing("super options"))?;

    Ok(MountInfoLine {
        root,
        mount_point,
        fs_type,
        super_options,
    })
}
