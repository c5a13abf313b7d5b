//! Hierarchical limit aggregation.
//!
//! Nested cgroups form a chain of limits and the effective limit is the
//! tightest one. The walk reads `(stats, limit)` at every level from the
//! leaf up to the mount root and reports the stats of the level whose
//! limit binds, because that is the level against which usage,
//! throttling, and OOM kills saturate. When no level imposes a limit the
//! leaf's stats are the most specific answer.

use super::error::{Error, Result};
use super::path::CGroupPath;

/// A limit value the walk can compare across levels.
pub(crate) trait LimitValue: Copy + PartialOrd {
    /// The "no limit observed yet" starting point.
    const UNSET: Self;

    /// Whether this value actually constrains anything. Unknown (`-1`),
    /// unconstrained (`0`), and the `max` sentinel are not limits.
    fn is_limiting(self) -> bool;
}

impl LimitValue for f64 {
    const UNSET: Self = f64::INFINITY;

    fn is_limiting(self) -> bool {
        self > 0.0
    }
}

impl LimitValue for i64 {
    const UNSET: Self = i64::MAX;

    fn is_limiting(self) -> bool {
        self > 0 && self != i64::MAX
    }
}

/// Walks from `leaf` to its mount root, reading every level with `read`,
/// and returns the stats of the level with the minimum positive limit.
///
/// Per-level read errors are tolerated as long as at least one level
/// succeeds; inner cgroups routinely lack individual pseudofiles. When
/// every level fails, the leaf-most error is returned to preserve
/// root-cause locality.
pub(crate) fn walk_binding<S, L, F>(leaf: CGroupPath, read: F) -> Result<S>
where
    S: Clone,
    L: LimitValue,
    F: Fn(&CGroupPath) -> Result<(S, L)>,
{
    let mut current = leaf;
    let mut leaf_stats: Option<S> = None;
    let mut min_limit = L::UNSET;
    let mut min_stats: Option<S> = None;
    let mut first_err: Option<Error> = None;

    loop {
        match read(&current) {
            Ok((stats, limit)) => {
                if limit.is_limiting() && limit < min_limit {
                    min_limit = limit;
                    min_stats = Some(stats.clone());
                }
                // The deepest successfully-read level.
                if leaf_stats.is_none() {
                    leaf_stats = Some(stats);
                }
            }
            Err(err) => {
                log::debug!(
                    "skipping cgroup level `{}`: {}",
                    current.abs_path.display(),
                    err
                );
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        let (parent, advanced) = current.parent()?;
        if !advanced {
            break;
        }
        current = parent;
    }

    match (min_stats, leaf_stats) {
        (Some(stats), _) => Ok(stats),
        (None, Some(stats)) => Ok(stats),
        (None, None) => Err(first_err.expect("walk visited at least the leaf")),
    }
}
