use thiserror::Error;

/// Error kinds the core distinguishes (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PktioError {
    /// Size, alignment, mode, or feature bit not supported.
    #[error("bad parameters: {0}")]
    BadParams(&'static str),
    /// Operation not valid in the slot's current state.
    #[error("wrong state for this operation: {0}")]
    WrongState(&'static str),
    /// Name already bound, or a pool has outstanding allocations on destroy.
    #[error("already in use: {0}")]
    InUse(&'static str),
    /// No free slot, no free buffer, no shared memory.
    #[error("resources exhausted: {0}")]
    Resources(&'static str),
    /// Driver-reported I/O error.
    #[error("transport error")]
    Transport,
    /// Optional capability not offered by the bound driver.
    #[error("not supported by the bound driver: {0}")]
    NotSupported(&'static str),
}
