//! Reference driver back-ends (spec §4.5, SPEC_FULL.md "ReferenceDrivers").
//!
//! Neither driver talks to real hardware: `loop` is the spec's minimal
//! reference back-end used to validate the device table's state machine;
//! `null` claims nothing and exists purely to give the table's ordered
//! driver-probe loop a second back-end to scan past (recovered from the
//! original registering several `pktio_if_ops` entries — `loop`, `socket`,
//! `netmap`, `ipc` — and trying each in turn; `platform/linux-generic/pktio/*.c`).

use pktio_core::{Driver, OpenReject, Packet};
use pktio_pool::{PoolHandle, PoolRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Claims any interface name starting with a configurable prefix (default
/// `"loop"`). `open` always succeeds for a matching name; `recv` always
/// reports zero packets; `send` consumes and frees everything handed to it
/// (spec §4.5: "a minimal reference back-end... `open` always succeeds,
/// `recv` returns zero, `send` consumes all packets and frees them").
pub struct LoopDriver {
    prefix: String,
    pools: Arc<PoolRegistry>,
    bound_pool: Mutex<HashMap<usize, PoolHandle>>,
}

impl LoopDriver {
    pub fn new(pools: Arc<PoolRegistry>) -> Self {
        Self::with_prefix(pools, "loop")
    }

    pub fn with_prefix(pools: Arc<PoolRegistry>, prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), pools, bound_pool: Mutex::new(HashMap::new()) }
    }
}

impl Driver for LoopDriver {
    fn name(&self) -> &str {
        "loop"
    }

    fn open(&self, slot: usize, name: &str, pool: Option<&PoolHandle>) -> Result<(), OpenReject> {
        if !name.starts_with(self.prefix.as_str()) {
            return Err(OpenReject::NotMine);
        }
        if let Some(pool) = pool {
            self.bound_pool.lock().unwrap().insert(slot, *pool);
        }
        Ok(())
    }

    fn close(&self, slot: usize) {
        self.bound_pool.lock().unwrap().remove(&slot);
    }

    fn recv(&self, _slot: usize, _queue_idx: u32, _packets: &mut [Option<Packet>]) -> Result<usize, ()> {
        Ok(0)
    }

    fn send(&self, slot: usize, _queue_idx: u32, packets: &[Packet]) -> Result<usize, ()> {
        if let Some(pool) = self.bound_pool.lock().unwrap().get(&slot).copied() {
            self.pools.free_multi(pool, packets);
        }
        Ok(packets.len())
    }
}

/// Claims nothing; `open` always reports [`OpenReject::NotMine`]. Exists so
/// the device table's driver-probe loop has more than one registered
/// back-end to scan past.
pub struct NullDriver;

impl Driver for NullDriver {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&self, _slot: usize, _name: &str, _pool: Option<&PoolHandle>) -> Result<(), OpenReject> {
        Err(OpenReject::NotMine)
    }

    fn close(&self, _slot: usize) {}

    fn recv(&self, _slot: usize, _queue_idx: u32, _packets: &mut [Option<Packet>]) -> Result<usize, ()> {
        Ok(0)
    }

    fn send(&self, _slot: usize, _queue_idx: u32, _packets: &[Packet]) -> Result<usize, ()> {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktio_core::{DeviceTable, OpenParams};
    use pktio_pool::PoolParams;

    fn table_with_both_drivers() -> (DeviceTable, Arc<PoolRegistry>) {
        let pools = Arc::new(PoolRegistry::new());
        let drivers: Vec<Arc<dyn Driver>> =
            vec![Arc::new(NullDriver), Arc::new(LoopDriver::new(Arc::clone(&pools)))];
        (DeviceTable::new(4, drivers, Arc::clone(&pools)), pools)
    }

    #[test]
    fn loop_driver_claims_matching_prefix_past_the_null_driver() {
        let (table, _pools) = table_with_both_drivers();
        let handle = table.open("loop0", None, OpenParams::default()).unwrap();
        table.start(handle).unwrap();
        assert_eq!(table.stats(handle).unwrap().driver.in_packets, 0);
    }

    #[test]
    fn loop_driver_rejects_non_matching_name() {
        let (table, _pools) = table_with_both_drivers();
        assert!(table.open("eth0", None, OpenParams::default()).is_err());
    }

    #[test]
    fn loop_driver_send_frees_packets_back_to_the_bound_pool() {
        let (table, pools) = table_with_both_drivers();
        let pool = pools.create("loop-pool", PoolParams::packet(16, 512)).unwrap();
        let handle = table.open("loop1", Some(pool), OpenParams::default()).unwrap();
        table.start(handle).unwrap();

        let bufs = pools.alloc_multi(pool, 4);
        assert_eq!(bufs.len(), 4);
        assert_eq!(pools.info(pool).unwrap().free_count, 12);

        // Exercise the driver directly, mirroring what `table.send` would
        // route to once a pktout queue is wired up to it. The slot index
        // only needs to be consistent between `open` and `send` here, not
        // the real table slot, since `handle`'s own slot is private to
        // `pktio-core`.
        const DRIVER_SLOT: usize = 0;
        let loop_driver = LoopDriver::new(Arc::clone(&pools));
        loop_driver.open(DRIVER_SLOT, "loop1", Some(&pool)).unwrap();
        let sent = loop_driver.send(DRIVER_SLOT, 0, &bufs).unwrap();
        assert_eq!(sent, 4);
        assert_eq!(pools.info(pool).unwrap().free_count, 16);
    }
}
