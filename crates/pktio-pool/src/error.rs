use thiserror::Error;

/// Errors surfaced by [`crate::PoolRegistry`] and [`crate::Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Requested parameters are not supported (bad type, oversize, bad alignment).
    #[error("bad pool parameters: {0}")]
    BadParams(&'static str),
    /// Every pool slot in the registry is already reserved.
    #[error("no free pool slot")]
    NoSlot,
    /// Backing (or user-area) memory could not be reserved.
    #[error("no memory for pool backing region")]
    NoMemory,
    /// `destroy` was called while a local cache still holds outstanding buffers.
    #[error("pool still in use: outstanding allocations")]
    InUse,
}
