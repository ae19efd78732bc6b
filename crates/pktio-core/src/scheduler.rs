//! Scheduler bridge callbacks (spec §4.4 "Scheduler bridge", §6). These are
//! the only entry points the out-of-scope external scheduler calls; none of
//! them block.

use crate::device::DeviceState;
use crate::driver::Packet;
use crate::table::DeviceTable;
use std::sync::atomic::Ordering;

/// Drains the named input queues via `driver.recv`, then bulk-enqueues the
/// results into each queue's own backing ring (which doubles as the
/// "associated internal event queue" spec §4.4 describes — the generic
/// event-queue subsystem itself is an out-of-scope collaborator, so the
/// queued/scheduled-mode `InputQueue` ring built in `queue.rs` fills that
/// role directly rather than handing off to a second structure).
///
/// Returns `Ok(())` normally, `Err(())` for a slot that has gone inactive or
/// into STOP_PENDING (spec: "−1 for an internal slot that has gone inactive
/// or into STOP_PENDING").
pub fn sched_cb_pktin_poll(table: &DeviceTable, slot_idx: usize, queue_indices: &[u32]) -> Result<(), ()> {
    let slot = table.slot_ref(slot_idx).map_err(|_| ())?;
    let (rx, _tx) = slot.lock_both();
    if rx.state != DeviceState::Started {
        return Err(());
    }
    let driver = rx.driver.as_ref().ok_or(())?;

    for &queue_idx in queue_indices {
        let Some(queue) = rx.input_queues.iter().find(|q| q.queue_index == queue_idx) else {
            continue;
        };
        let Some(ring) = queue.backing() else {
            continue;
        };
        let mut batch: [Option<Packet>; 32] = [None; 32];
        if let Ok(n) = driver.recv(slot_idx, queue_idx, &mut batch) {
            if n > 0 {
                ring.enqueue_batch_spin(&batch[..n]);
            }
        }
    }
    Ok(())
}

/// Pulls from the driver directly and returns events to the scheduler,
/// applying an optional classifier redirect hook per packet (spec §4.4
/// `sched_cb_pktin_poll_one`, §8 scenario 2). The classifier subsystem
/// itself is out of scope (spec §1); `classify` stands in for its
/// `dst_queue`-marking hook, returning `Some(queue_index)` when a packet
/// should be redirected instead of returned to the caller.
///
/// A redirected packet that fails to enqueue into its destination queue is
/// freed back to the slot's pool and counted in `in_discards`.
pub fn sched_cb_pktin_poll_one(
    table: &DeviceTable,
    slot_idx: usize,
    queue_idx: u32,
    out: &mut [Option<Packet>],
    classify: Option<&dyn Fn(&Packet) -> Option<u32>>,
) -> Result<usize, ()> {
    let slot = table.slot_ref(slot_idx).map_err(|_| ())?;
    let (rx, _tx) = slot.lock_both();
    if rx.state != DeviceState::Started {
        return Err(());
    }
    let driver = rx.driver.as_ref().ok_or(())?;

    let mut scratch: Vec<Option<Packet>> = vec![None; out.len()];
    let n = driver.recv(slot_idx, queue_idx, &mut scratch)?;

    let mut kept = 0;
    for packet in scratch.into_iter().take(n).flatten() {
        let dst_queue = classify.and_then(|f| f(&packet));
        match dst_queue {
            None => {
                out[kept] = Some(packet);
                kept += 1;
            }
            Some(dst) => {
                let delivered = rx
                    .input_queues
                    .iter()
                    .find(|q| q.queue_index == dst)
                    .and_then(|q| q.backing())
                    .is_some_and(|ring| ring.enqueue_batch(&[Some(packet)]) == 1);
                if !delivered {
                    if let Some(pool) = rx.pool {
                        table.pools().free(pool, packet);
                    }
                    slot.in_discards.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
    Ok(kept)
}

/// Transitions STOP_PENDING → STOPPED or CLOSE_PENDING → FREE under the
/// slot lock (spec §4.4 `sched_cb_pktio_stop_finalize`).
pub fn sched_cb_pktio_stop_finalize(table: &DeviceTable, slot_idx: usize) -> Result<(), ()> {
    let slot = table.slot_ref(slot_idx).map_err(|_| ())?;
    let (mut rx, _tx) = slot.lock_both();
    match rx.state {
        DeviceState::StopPending => {
            rx.state = DeviceState::Stopped;
            Ok(())
        }
        DeviceState::ClosePending => {
            rx.state = DeviceState::Free;
            drop(rx);
            table.release_name_slot(slot_idx);
            Ok(())
        }
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OpenParams, PktinQueueParam};
    use crate::driver::{Driver, OpenReject};
    use crate::queue::InMode;
    use pktio_pool::{PoolHandle, PoolParams, PoolRegistry};
    use std::sync::Arc;

    struct CountingDriver {
        pools: Arc<PoolRegistry>,
        pool: PoolHandle,
    }
    impl Driver for CountingDriver {
        fn name(&self) -> &str {
            "counting"
        }
        fn open(&self, _slot: usize, _name: &str, _pool: Option<&PoolHandle>) -> Result<(), OpenReject> {
            Ok(())
        }
        fn close(&self, _slot: usize) {}
        fn recv(&self, _slot: usize, _queue_idx: u32, packets: &mut [Option<Packet>]) -> Result<usize, ()> {
            packets[0] = self.pools.alloc(self.pool).map(Some).unwrap_or(None);
            Ok(if packets[0].is_some() { 1 } else { 0 })
        }
        fn send(&self, _slot: usize, _queue_idx: u32, packets: &[Packet]) -> Result<usize, ()> {
            Ok(packets.len())
        }
    }

    fn table_with_pool() -> (DeviceTable, PoolHandle) {
        let pools = Arc::new(PoolRegistry::new());
        let pool = pools.create("classify-pool", PoolParams::packet(64, 512)).unwrap();
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(CountingDriver { pools: Arc::clone(&pools), pool })];
        (DeviceTable::new(2, drivers, pools), pool)
    }

    #[test]
    fn poll_one_passes_through_without_classifier() {
        let (table, pool) = table_with_pool();
        let handle =
            table.open("s0", Some(pool), OpenParams { in_mode: InMode::Scheduled, ..Default::default() }).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();

        let mut out = [None, None];
        let n = sched_cb_pktin_poll_one(&table, handle.slot(), 0, &mut out, None).unwrap();
        assert_eq!(n, 1);
        assert!(out[0].is_some());
    }

    #[test]
    fn poll_one_redirects_to_destination_queue() {
        let (table, pool) = table_with_pool();
        let handle =
            table.open("s1", Some(pool), OpenParams { in_mode: InMode::Scheduled, ..Default::default() }).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 2, ..Default::default() }).unwrap();
        table.start(handle).unwrap();

        let mut out = [None];
        let n = sched_cb_pktin_poll_one(&table, handle.slot(), 0, &mut out, Some(&|_p| Some(1))).unwrap();
        assert_eq!(n, 0);
        assert!(out[0].is_none());
    }

    #[test]
    fn poll_one_fails_when_not_started() {
        let (table, pool) = table_with_pool();
        let handle = table.open("s2", Some(pool), OpenParams::default()).unwrap();
        let mut out = [None];
        assert!(sched_cb_pktin_poll_one(&table, handle.slot(), 0, &mut out, None).is_err());
    }
}
