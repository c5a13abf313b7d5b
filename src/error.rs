use crate::{cgroup, host};

/// Errors surfaced by the crate-level accessors, which combine cgroup and
/// host readings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cgroup(#[from] cgroup::Error),

    #[error(transparent)]
    Host(#[from] host::Error),
}
