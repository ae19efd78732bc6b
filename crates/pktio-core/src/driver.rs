//! The driver plugin interface (spec §4.3): a vtable every transport
//! back-end implements. Sync, not async — unlike the `SpanExporter`/
//! `SpanExporterBoxed` split this crate's sibling example needs for
//! object-safe async dispatch, every method here already returns a plain
//! value, so a single trait is directly object-safe (`Arc<dyn Driver>`).
//!
//! Most operations are optional: the core provides a default that mirrors
//! what the original driver contract does when a back-end omits the entry
//! (e.g. `capability` defaults to 1 input queue / 1 output queue /
//! promiscuous-mode settable).

use pktio_pool::BufferHandle;

/// A packet is just a pool buffer handle at this layer — payload framing is
/// the caller's concern.
pub type Packet = BufferHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCapability {
    pub max_input_queues: u32,
    pub max_output_queues: u32,
    pub promisc_settable: bool,
    /// Feature bits `config()` is allowed to set; defaults to "all of them"
    /// for drivers that don't otherwise restrict it.
    pub supported_feature_bits: u64,
}

impl Default for DriverCapability {
    fn default() -> Self {
        Self {
            max_input_queues: 1,
            max_output_queues: 1,
            promisc_settable: true,
            supported_feature_bits: u64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub in_packets: u64,
    pub in_discards: u64,
    pub out_packets: u64,
    pub out_errors: u64,
}

/// 1 up, 0 down, -1 error (spec §4.3 `link_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Down,
    Up,
    Error,
}

/// Driver-reported MAC address. Six bytes, no framing beyond that.
pub type MacAddr = [u8; 6];

/// Why a driver's `open` declined a slot. The original's plain nonzero
/// return blurs "not mine, try the next driver" and "this is mine but it
/// failed" into one signal; the table only needs the distinction to produce
/// a clearer error when every driver has been tried, so it doesn't change
/// the scan-all-until-success control flow (spec §4.3 "driver list").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenReject {
    /// This driver doesn't recognize the name; the table should try the
    /// next registered driver.
    NotMine,
    /// This driver recognizes the name but failed to open it (device node
    /// missing, permission denied, transport error).
    Transport,
}

/// A transport back-end. `name` identifies the driver for diagnostics;
/// `open` is how the core offers a slot's requested interface name to each
/// registered driver in turn.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Global, once-per-process registration. Default: no-op.
    fn init_global(&self) {}

    /// Global teardown, mirrors `init_global`. Default: no-op.
    fn term_global(&self) {}

    /// Attempts to claim `name`. `Ok(())` claims the slot; `Err(OpenReject)`
    /// tells the core whether to try the next registered driver or give up.
    fn open(&self, slot: usize, name: &str, pool: Option<&pktio_pool::PoolHandle>) -> Result<(), OpenReject>;

    /// Releases driver resources. Idempotent after a successful call.
    fn close(&self, slot: usize);

    /// Prepares the data path. Default: no-op success.
    fn start(&self, _slot: usize) -> Result<(), ()> {
        Ok(())
    }

    /// Tears down the data path. Default: no-op success.
    fn stop(&self, _slot: usize) -> Result<(), ()> {
        Ok(())
    }

    /// Pulls up to `packets.len()` packets, allocating each from the slot's
    /// pool as it receives it and writing `Some(handle)` into the
    /// corresponding output slot (unfilled slots are left `None`). Returns
    /// the count pulled, or `Err(())` on a transport error (spec: "returns
    /// count (>= 0) or -1").
    fn recv(&self, slot: usize, queue_idx: u32, packets: &mut [Option<Packet>]) -> Result<usize, ()>;

    /// Blocking variant with a microsecond budget. Default: unsupported —
    /// the core falls back to its own spin-with-sleep loop.
    fn recv_tmo(
        &self,
        _slot: usize,
        _queue_idx: u32,
        _packets: &mut [Option<Packet>],
        _wait_usec: u64,
    ) -> Option<Result<usize, ()>> {
        None
    }

    /// Pushes up to `packets.len()`. Returns accepted count, or `Err(())`.
    fn send(&self, slot: usize, queue_idx: u32, packets: &[Packet]) -> Result<usize, ()>;

    fn mtu_get(&self, _slot: usize) -> Option<u32> {
        None
    }

    fn mac_get(&self, _slot: usize) -> Option<MacAddr> {
        None
    }

    fn mac_set(&self, _slot: usize, _mac: MacAddr) -> Result<(), ()> {
        Err(())
    }

    fn promisc_mode_set(&self, _slot: usize, _enable: bool) -> Result<(), ()> {
        Err(())
    }

    fn promisc_mode_get(&self, _slot: usize) -> Option<bool> {
        None
    }

    /// 1 up, 0 down, -1 error. Default: unknown (reported as down).
    fn link_status(&self, _slot: usize) -> LinkStatus {
        LinkStatus::Down
    }

    /// Default: the core's own defaults (spec §4.4 "Capability defaults").
    fn capability(&self, _slot: usize) -> DriverCapability {
        DriverCapability::default()
    }

    /// Applies validated feature-bit configuration. Default: no-op success.
    fn config(&self, _slot: usize, _feature_bits: u64) -> Result<(), ()> {
        Ok(())
    }

    fn input_queues_config(&self, _slot: usize, _num_queues: u32) {}
    fn output_queues_config(&self, _slot: usize, _num_queues: u32) {}

    fn stats(&self, _slot: usize) -> DriverStats {
        DriverStats::default()
    }

    fn stats_reset(&self, _slot: usize) {}

    fn print(&self, _slot: usize) {}
}
