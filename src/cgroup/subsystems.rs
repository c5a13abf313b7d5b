//! Parsing of the `/proc/cgroups` controller table.
//!
//! The table has a `#`-prefixed header row followed by one row per
//! controller. The canonical column order is
//! `subsys_name hierarchy num_cgroups enabled`, but columns have been
//! added before and may be reordered or dropped again, so the reader
//! rebuilds a column map from the header whenever the canonical order
//! does not hold.

use std::path::Path;

use crate::fsutil;

use super::error::{Error, Result};

const PROC_CGROUPS_PATH: &str = "/proc/cgroups";

/// One row of `/proc/cgroups`: a controller and the hierarchy it is
/// bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsystem {
    /// Controller name (`cpu`, `memory`, ...).
    pub name: String,
    /// Hierarchy ID the controller is bound to; 0 under cgroup v2.
    pub hierarchy: u32,
    /// Number of cgroups in that hierarchy; 0 when the column is absent.
    pub num_cgroups: u64,
    /// Whether the controller is enabled; `true` when the column is
    /// absent.
    pub enabled: bool,
}

/// Reads and parses `/proc/cgroups`.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] when the file does not exist (a system
/// without cgroups compiled in); parse failures otherwise.
pub fn read_subsystems() -> Result<Vec<Subsystem>> {
    let contents = fsutil::read_to_string(PROC_CGROUPS_PATH).map_err(|err| {
        if err.is_not_found() {
            Error::Unsupported
        } else {
            Error::Read(err)
        }
    })?;
    parse_subsystems(Path::new(PROC_CGROUPS_PATH), &contents)
}

/// Column positions for the fields of interest; `None` marks an optional
/// column the header does not carry.
struct ColumnMap {
    width: usize,
    name: usize,
    hierarchy: usize,
    num_cgroups: Option<usize>,
    enabled: Option<usize>,
}

const CANONICAL_HEADER: [&str; 4] = ["subsys_name", "hierarchy", "num_cgroups", "enabled"];

fn map_columns(path: &Path, headers: &[&str]) -> Result<ColumnMap> {
    let mut name = None;
    let mut hierarchy = None;
    let mut num_cgroups = None;
    let mut enabled = None;

    let mut claim = |slot: &mut Option<usize>, column: &str, idx: usize| -> Result<()> {
        if let Some(first) = *slot {
            return Err(Error::DuplicateColumn {
                path: path.to_path_buf(),
                column: column.to_owned(),
                first,
                second: idx,
            });
        }
        *slot = Some(idx);
        Ok(())
    };

    for (idx, header) in headers.iter().copied().enumerate() {
        match header.to_ascii_lowercase().as_str() {
            "subsys_name" => claim(&mut name, header, idx)?,
            "hierarchy" => claim(&mut hierarchy, header, idx)?,
            "num_cgroups" => claim(&mut num_cgroups, header, idx)?,
            "enabled" => claim(&mut enabled, header, idx)?,
            // Columns this reader has never heard of are tolerated.
            _ => {}
        }
    }

    let missing = |column| Error::MissingColumn {
        path: path.to_path_buf(),
        column,
    };
    Ok(ColumnMap {
        width: headers.len(),
        name: name.ok_or_else(|| missing("subsys_name"))?,
        hierarchy: hierarchy.ok_or_else(|| missing("hierarchy"))?,
        num_cgroups,
        enabled,
    })
}

fn parse_subsystems(path: &Path, contents: &str) -> Result<Vec<Subsystem>> {
    let mut lines = contents.split('\n');
    let header_line = lines.next().unwrap_or("");
    let headers: Vec<&str> = header_line.trim_start_matches('#').split_whitespace().collect();

    // Fast path for the canonical column order, which every kernel since
    // the table gained its current shape emits.
    let columns = if headers == CANONICAL_HEADER {
        ColumnMap {
            width: 4,
            name: 0,
            hierarchy: 1,
            num_cgroups: Some(2),
            enabled: Some(3),
        }
    } else {
        map_columns(path, &headers)?
    };

    let mut out = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != columns.width {
            return Err(Error::ColumnCount {
                path: path.to_path_buf(),
                line: idx + 2,
                got: fields.len(),
                want: columns.width,
            });
        }
        let parse_int = |value: &str| -> Result<u64> {
            value.parse::<u64>().map_err(|source| Error::BadInteger {
                path: path.to_path_buf(),
                value: value.to_owned(),
                source,
            })
        };
        let hierarchy_field = fields[columns.hierarchy];
        let hierarchy = hierarchy_field
            .parse::<u32>()
            .map_err(|source| Error::BadInteger {
                path: path.to_path_buf(),
                value: hierarchy_field.to_owned(),
                source,
            })?;
        let num_cgroups = match columns.num_cgroups {
            Some(col) => parse_int(fields[col])?,
            None => 0,
        };
        let enabled = match columns.enabled {
            Some(col) => parse_bool(path, fields[col])?,
            None => true,
        };
        out.push(Subsystem {
            name: fields[columns.name].to_owned(),
            hierarchy,
            num_cgroups,
            enabled,
        });
    }
    Ok(out)
}

fn parse_bool(path: &Path, value: &str) -> Result<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::BadBool {
            path: path.to_path_buf(),
            value: value.to_owned(),
        }),
    }
}
