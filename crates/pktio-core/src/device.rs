//! A single device table slot and its state machine (spec §3 "Device slot",
//! "Device states").

use crate::queue::{InMode, InputQueue, OutMode, OutputQueue};
use crate::sync::{TicketLock, TicketLockGuard};
use pktio_pool::PoolHandle;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// `FREE -> ACTIVE -> OPENED -> STARTED -> STOP_PENDING -> STOPPED ->
/// CLOSE_PENDING -> FREE`, plus the direct shortcuts `OPENED -> FREE` (open
/// failure) and `STOPPED -> FREE` (normal close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Free,
    Active,
    Opened,
    Started,
    StopPending,
    Stopped,
    ClosePending,
}

/// Feature-bit and parser-layer configuration recorded by `config()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveConfig {
    pub feature_bits: u64,
    /// The core always overrides this to "ALL" regardless of what a driver
    /// reports (spec §4.4 "Capability defaults").
    pub parser_layer_all: bool,
}

/// Receive-side fields, guarded by [`DeviceSlot::rxl`].
pub(crate) struct RxState {
    pub state: DeviceState,
    pub name: Option<String>,
    pub driver: Option<Arc<dyn crate::driver::Driver>>,
    pub in_mode: InMode,
    pub config: ActiveConfig,
    pub pool: Option<PoolHandle>,
    pub input_queues: Vec<InputQueue>,
    pub classifier_enabled: bool,
}

impl Default for RxState {
    fn default() -> Self {
        Self {
            state: DeviceState::Free,
            name: None,
            driver: None,
            in_mode: InMode::Direct,
            config: ActiveConfig::default(),
            pool: None,
            input_queues: Vec::new(),
            classifier_enabled: false,
        }
    }
}

/// Transmit-side fields, guarded by [`DeviceSlot::txl`].
#[derive(Default)]
pub(crate) struct TxState {
    pub out_mode: OutMode,
    pub output_queues: Vec<OutputQueue>,
}

/// One fixed-size device table entry.
///
/// Locking discipline (spec §4.4): state transitions and queue
/// configuration take `rxl` then `txl`, in that order, and release in
/// reverse. A driver's hot-path `recv`/`send` may run without either lock
/// once the slot is STARTED — drivers own their own per-queue locking.
pub struct DeviceSlot {
    pub(crate) rxl: TicketLock<RxState>,
    pub(crate) txl: TicketLock<TxState>,
    pub in_discards: AtomicU64,
}

impl Default for DeviceSlot {
    fn default() -> Self {
        Self {
            rxl: TicketLock::new(RxState::default()),
            txl: TicketLock::new(TxState::default()),
            in_discards: AtomicU64::new(0),
        }
    }
}

impl DeviceSlot {
    /// Acquires both locks in the table's fixed order.
    pub(crate) fn lock_both(&self) -> (TicketLockGuard<'_, RxState>, TicketLockGuard<'_, TxState>) {
        let rx = self.rxl.lock();
        let tx = self.txl.lock();
        (rx, tx)
    }
}
