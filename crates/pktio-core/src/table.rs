//! The device table (spec §3 "Device slot"/"Device states", §4.4).
//!
//! Locking discipline: a single table-wide [`Spinlock`] guards only slot
//! allocation and the name index. Everything else — state transitions,
//! queue configuration, driver calls — is protected by the slot's own
//! `rxl`/`txl` ticket locks, acquired rx-then-tx and released in reverse
//! (see [`DeviceSlot::lock_both`]). The table lock is dropped as soon as a
//! slot is marked ACTIVE and its name recorded, before the driver probe
//! loop runs (spec §9 "Open question": a deliberate relaxation from holding
//! it across the whole probe, since driver `open` may block on real I/O).

use crate::config::{
    OpenParams, PktinQueueParam, PktioConfig, PktoutQueueParam, DEFAULT_QUEUE_CAPACITY, MAX_NAME_LEN, NO_WAIT, WAIT,
};
use crate::device::{DeviceSlot, DeviceState};
use crate::driver::{Driver, DriverCapability, DriverStats, LinkStatus, MacAddr, OpenReject, Packet};
use crate::error::PktioError;
use crate::handle::PktioHandle;
use crate::queue::{InMode, InputQueue, OutMode, OutputQueue, PktInQueue, PktOutQueue};
use crate::sync::Spinlock;
use pktio_pool::{BufferType, PoolHandle, PoolRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sleep granularity of the `recv_tmo`/`recv_mq_tmo` spin loop, recovered
/// verbatim from `odp_packet_io.c`'s wait loop (spec §4.4 "Timed receive").
const SLEEP_USEC: u64 = 1;

/// How many `SLEEP_USEC` sleeps pass between deadline checks, recovered
/// verbatim from `odp_packet_io.c`'s wait loop (spec §4.4 "Timed receive").
const SLEEP_CHECK: u64 = 32;

/// Descriptive snapshot returned by [`DeviceTable::info`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub state: DeviceState,
    pub in_mode: InMode,
    pub out_mode: OutMode,
    pub num_in_queues: u32,
    pub num_out_queues: u32,
}

/// Driver stats plus the table's own `in_discards` counter (spec §3 "Device
/// slot" statistics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub driver: DriverStats,
    pub in_discards: u64,
}

/// Fixed-capacity array of device slots, a statically-registered driver
/// list, and the pool registry receive queues allocate from.
pub struct DeviceTable {
    table_lock: Spinlock<Vec<Option<String>>>,
    slots: Vec<DeviceSlot>,
    drivers: Vec<Arc<dyn Driver>>,
    pools: Arc<PoolRegistry>,
}

impl DeviceTable {
    pub fn new(num_slots: usize, drivers: Vec<Arc<dyn Driver>>, pools: Arc<PoolRegistry>) -> Self {
        let mut names = Vec::with_capacity(num_slots);
        names.resize_with(num_slots, || None);
        let mut slots = Vec::with_capacity(num_slots);
        slots.resize_with(num_slots, DeviceSlot::default);
        Self { table_lock: Spinlock::new(names), slots, drivers, pools }
    }

    /// Calls each registered driver's `init_global` (spec §4.4 `init_global`).
    pub fn init_global(&self) {
        for driver in &self.drivers {
            driver.init_global();
        }
    }

    pub(crate) fn slot_ref(&self, idx: usize) -> Result<&DeviceSlot, PktioError> {
        self.slots.get(idx).ok_or(PktioError::BadParams("invalid device handle"))
    }

    pub(crate) fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub(crate) fn release_name_slot(&self, idx: usize) {
        self.table_lock.lock()[idx] = None;
    }

    /// Highest valid slot index plus one (spec §6 `max_index`).
    pub fn max_index(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Linear scan under the table lock (spec §4.4 `lookup`).
    pub fn lookup(&self, name: &str) -> Option<PktioHandle> {
        let names = self.table_lock.lock();
        names.iter().position(|n| n.as_deref() == Some(name)).map(PktioHandle::from_slot)
    }

    /// Validates `name`/`pool`, reserves a slot under the table lock, then
    /// tries each registered driver in order under the slot's rx+tx locks
    /// (spec §4.4 `open`).
    pub fn open(&self, name: &str, pool: Option<PoolHandle>, params: OpenParams) -> Result<PktioHandle, PktioError> {
        if name.len() >= MAX_NAME_LEN {
            return Err(PktioError::BadParams("interface name too long"));
        }
        if let Some(handle) = pool {
            match self.pools.info(handle) {
                Some(info) if info.buf_type == BufferType::Packet => {}
                Some(_) => return Err(PktioError::BadParams("pool is not a packet pool")),
                None => return Err(PktioError::BadParams("unknown pool handle")),
            }
        }

        let slot_idx = {
            let mut names = self.table_lock.lock();
            if names.iter().any(|n| n.as_deref() == Some(name)) {
                return Err(PktioError::InUse("name already bound"));
            }
            let idx = names.iter().position(Option::is_none).ok_or(PktioError::Resources("no free device slot"))?;
            names[idx] = Some(name.to_owned());
            idx
        };

        let slot = &self.slots[slot_idx];
        let (mut rx, mut tx) = slot.lock_both();
        rx.state = DeviceState::Active;
        rx.name = Some(name.to_owned());
        rx.in_mode = params.in_mode;
        rx.pool = pool;
        tx.out_mode = params.out_mode;

        let mut reject = OpenReject::NotMine;
        let mut claimed = None;
        for driver in &self.drivers {
            match driver.open(slot_idx, name, pool.as_ref()) {
                Ok(()) => {
                    claimed = Some(Arc::clone(driver));
                    break;
                }
                Err(r) => reject = r,
            }
        }

        match claimed {
            Some(driver) => {
                rx.driver = Some(driver);
                rx.state = DeviceState::Opened;
                drop(tx);
                drop(rx);
                Ok(PktioHandle::from_slot(slot_idx))
            }
            None => {
                rx.state = DeviceState::Free;
                rx.name = None;
                rx.pool = None;
                drop(tx);
                drop(rx);
                self.release_name_slot(slot_idx);
                Err(match reject {
                    OpenReject::Transport => PktioError::Transport,
                    OpenReject::NotMine => PktioError::Resources("no registered driver claimed this name"),
                })
            }
        }
    }

    /// Requires STOPPED or OPENED (spec §4.4 `close`). In STOPPED state,
    /// drains direct-mode input queues in batches of 16, freeing each
    /// packet back to the slot's pool, before tearing down queues and
    /// calling the driver's `close`.
    ///
    /// A scheduled-input slot that was STOPPED moves to CLOSE_PENDING
    /// instead of straight to FREE, mirroring the STOP_PENDING/finalize
    /// pattern: the scheduler bridge must observe the stop before the slot
    /// can be fully released (spec §4.4 scheduler bridge
    /// `sched_cb_pktio_stop_finalize`).
    pub fn close(&self, handle: PktioHandle) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (mut rx, mut tx) = slot.lock_both();

        if !matches!(rx.state, DeviceState::Stopped | DeviceState::Opened) {
            return Err(PktioError::WrongState("close requires STOPPED or OPENED"));
        }

        if rx.state == DeviceState::Stopped {
            if let Some(pool) = rx.pool {
                for q in &rx.input_queues {
                    if q.mode() != InMode::Direct {
                        continue;
                    }
                    loop {
                        let mut batch: [Option<Packet>; 16] = [None; 16];
                        let driver = rx.driver.as_ref().expect("a STOPPED slot always has a bound driver");
                        let n = driver.recv(handle.slot(), q.queue_index, &mut batch).unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        for packet in batch.into_iter().take(n).flatten() {
                            self.pools.free(pool, packet);
                        }
                    }
                }
            }
        }

        let finalize_pending = rx.state == DeviceState::Stopped && rx.in_mode == InMode::Scheduled;

        rx.input_queues.clear();
        tx.output_queues.clear();
        if let Some(driver) = rx.driver.take() {
            driver.close(handle.slot());
        }
        rx.name = None;
        rx.pool = None;
        rx.state = if finalize_pending { DeviceState::ClosePending } else { DeviceState::Free };

        drop(tx);
        drop(rx);
        if !finalize_pending {
            self.release_name_slot(handle.slot());
        }
        Ok(())
    }

    /// Allowed only when not STARTED (spec §4.4 `config`). The core always
    /// overrides `parser_layer_all` to true regardless of what's requested
    /// (spec §4.4 "Capability defaults").
    pub fn config(&self, handle: PktioHandle, cfg: PktioConfig) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (mut rx, _tx) = slot.lock_both();
        if rx.state == DeviceState::Started {
            return Err(PktioError::WrongState("config requires non-STARTED"));
        }
        let driver = rx.driver.clone().ok_or(PktioError::WrongState("slot not opened"))?;
        let cap = driver.capability(handle.slot());
        if cfg.feature_bits & !cap.supported_feature_bits != 0 {
            return Err(PktioError::BadParams("feature bits not supported by the bound driver"));
        }
        rx.config.feature_bits = cfg.feature_bits;
        rx.config.parser_layer_all = true;
        driver.config(handle.slot(), cfg.feature_bits).map_err(|()| PktioError::Transport)?;
        Ok(())
    }

    /// Only from OPENED or STOPPED (spec §4.4 `start`). In scheduled input
    /// mode, at least one input queue must already be configured.
    pub fn start(&self, handle: PktioHandle) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (mut rx, _tx) = slot.lock_both();
        if !matches!(rx.state, DeviceState::Opened | DeviceState::Stopped) {
            return Err(PktioError::WrongState("start requires OPENED or STOPPED"));
        }
        if rx.in_mode == InMode::Scheduled && rx.input_queues.is_empty() {
            return Err(PktioError::BadParams("scheduled mode requires at least one input queue"));
        }
        let driver = rx.driver.clone().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.start(handle.slot()).map_err(|()| PktioError::Transport)?;
        rx.state = DeviceState::Started;
        Ok(())
    }

    /// Only from STARTED (spec §4.4 `stop`). Scheduled input moves to
    /// STOP_PENDING pending the scheduler bridge's finalize call; otherwise
    /// straight to STOPPED.
    pub fn stop(&self, handle: PktioHandle) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (mut rx, _tx) = slot.lock_both();
        if rx.state != DeviceState::Started {
            return Err(PktioError::WrongState("stop requires STARTED"));
        }
        let driver = rx.driver.clone().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.stop(handle.slot()).map_err(|()| PktioError::Transport)?;
        rx.state = if rx.in_mode == InMode::Scheduled { DeviceState::StopPending } else { DeviceState::Stopped };
        Ok(())
    }

    /// Creates (or destroys, with `num_queues: 0`) the configured number of
    /// input queues; validates against `capability.max_input_queues` (spec
    /// §4.4 `input_queue_config`). A no-op when the input side is `DISABLED`
    /// (spec §6 "Modes"): no queues are created and the driver isn't called.
    pub fn input_queue_config(&self, handle: PktioHandle, params: PktinQueueParam) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (mut rx, _tx) = slot.lock_both();
        if rx.state == DeviceState::Started {
            return Err(PktioError::WrongState("queue config requires non-STARTED"));
        }
        if rx.in_mode == InMode::Disabled {
            rx.input_queues.clear();
            return Ok(());
        }
        let driver = rx.driver.clone().ok_or(PktioError::WrongState("slot not opened"))?;
        let cap = driver.capability(handle.slot());
        if params.num_queues > cap.max_input_queues {
            return Err(PktioError::BadParams("num_queues exceeds capability.max_input_queues"));
        }
        let in_mode = rx.in_mode;
        rx.input_queues =
            (0..params.num_queues).map(|i| InputQueue::new(i, in_mode, DEFAULT_QUEUE_CAPACITY)).collect();
        rx.classifier_enabled = params.classifier_enable;
        driver.input_queues_config(handle.slot(), params.num_queues);
        Ok(())
    }

    /// Creates (or destroys) the configured number of output queues;
    /// validates against `capability.max_output_queues` (spec §4.4
    /// `output_queue_config`). A no-op when the output side is `TM` or
    /// `DISABLED` (spec §6 "Modes": "configuration is a no-op here" for TM):
    /// no queues are created and the driver isn't called.
    pub fn output_queue_config(&self, handle: PktioHandle, params: PktoutQueueParam) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, mut tx) = slot.lock_both();
        if rx.state == DeviceState::Started {
            return Err(PktioError::WrongState("queue config requires non-STARTED"));
        }
        if matches!(tx.out_mode, OutMode::Tm | OutMode::Disabled) {
            tx.output_queues.clear();
            return Ok(());
        }
        let driver = rx.driver.clone().ok_or(PktioError::WrongState("slot not opened"))?;
        let cap = driver.capability(handle.slot());
        if params.num_queues > cap.max_output_queues {
            return Err(PktioError::BadParams("num_queues exceeds capability.max_output_queues"));
        }
        let out_mode = tx.out_mode;
        tx.output_queues = (0..params.num_queues).map(|i| OutputQueue::new(i, out_mode)).collect();
        driver.output_queues_config(handle.slot(), params.num_queues);
        Ok(())
    }

    /// Direct-mode pollable input-queue handles (spec §6 `pktin_queue`).
    pub fn pktin_queue(&self, handle: PktioHandle, out: &mut [PktInQueue]) -> Result<usize, PktioError> {
        self.collect_in_queues(handle, out, |mode| mode == InMode::Direct)
    }

    /// Queued/scheduled-mode input event-queue handles (spec §6
    /// `pktin_event_queue`).
    pub fn pktin_event_queue(&self, handle: PktioHandle, out: &mut [PktInQueue]) -> Result<usize, PktioError> {
        self.collect_in_queues(handle, out, |mode| matches!(mode, InMode::Queued | InMode::Scheduled))
    }

    fn collect_in_queues(
        &self,
        handle: PktioHandle,
        out: &mut [PktInQueue],
        mode_matches: impl Fn(InMode) -> bool,
    ) -> Result<usize, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        if !mode_matches(rx.in_mode) {
            return Ok(0);
        }
        let mut n = 0;
        for q in &rx.input_queues {
            if n >= out.len() {
                break;
            }
            out[n] = PktInQueue::new(handle, q.queue_index);
            n += 1;
        }
        Ok(n)
    }

    /// Direct-mode pollable output-queue handles (spec §6 `pktout_queue`).
    pub fn pktout_queue(&self, handle: PktioHandle, out: &mut [PktOutQueue]) -> Result<usize, PktioError> {
        self.collect_out_queues(handle, out, |mode| mode == OutMode::Direct)
    }

    /// Queued-mode output event-queue handles (spec §6 `pktout_event_queue`).
    pub fn pktout_event_queue(&self, handle: PktioHandle, out: &mut [PktOutQueue]) -> Result<usize, PktioError> {
        self.collect_out_queues(handle, out, |mode| mode == OutMode::Queued)
    }

    fn collect_out_queues(
        &self,
        handle: PktioHandle,
        out: &mut [PktOutQueue],
        mode_matches: impl Fn(OutMode) -> bool,
    ) -> Result<usize, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (_rx, tx) = slot.lock_both();
        if !mode_matches(tx.out_mode) {
            return Ok(0);
        }
        let mut n = 0;
        for q in &tx.output_queues {
            if n >= out.len() {
                break;
            }
            out[n] = PktOutQueue::new(handle, q.queue_index);
            n += 1;
        }
        Ok(n)
    }

    /// Pulls up to `packets.len()` from `queue` (spec §6 `recv`). Takes and
    /// releases the slot's rx lock for just this one call — never held
    /// across a sleep, per [`Self::recv_tmo`]'s spin loop.
    pub fn recv(&self, queue: PktInQueue, packets: &mut [Option<Packet>]) -> Result<usize, PktioError> {
        let slot = self.slot_ref(queue.device().slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        let q = rx
            .input_queues
            .get(queue.index() as usize)
            .ok_or(PktioError::BadParams("invalid pktin queue"))?;
        q.recv(driver.as_ref(), queue.device().slot(), packets).map_err(|()| PktioError::Transport)
    }

    /// Pushes up to `packets.len()` onto `queue` (spec §6 `send`).
    pub fn send(&self, queue: PktOutQueue, packets: &[Packet]) -> Result<usize, PktioError> {
        let slot = self.slot_ref(queue.device().slot())?;
        let (rx, tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        let q = tx
            .output_queues
            .get(queue.index() as usize)
            .ok_or(PktioError::BadParams("invalid pktout queue"))?;
        q.send(driver.as_ref(), queue.device().slot(), packets).map_err(|()| PktioError::Transport)
    }

    /// Timed receive (spec §4.4 "Timed receive", §8 "`recv_tmo(..., wait =
    /// 0)` returns 0 immediately..., `wait = WAIT` never times out").
    ///
    /// Delegates to the bound driver's own `recv_tmo` when it offers one and
    /// `wait_usec != NO_WAIT` — that call runs with no slot lock held, so a
    /// driver that blocks internally for its budget never stalls other
    /// operations on this slot. Otherwise falls back to polling `recv` in a
    /// loop, sleeping `SLEEP_USEC` at a time and checking the deadline every
    /// `SLEEP_CHECK` sleeps; each `recv` attempt takes and releases the slot
    /// lock on its own, so the lock is never held across a sleep.
    pub fn recv_tmo(
        &self,
        queue: PktInQueue,
        packets: &mut [Option<Packet>],
        wait_usec: u64,
    ) -> Result<usize, PktioError> {
        if wait_usec != NO_WAIT {
            let driver = {
                let slot = self.slot_ref(queue.device().slot())?;
                let (rx, _tx) = slot.lock_both();
                rx.driver.clone()
            };
            if let Some(driver) = driver {
                if let Some(result) = driver.recv_tmo(queue.device().slot(), queue.index(), packets, wait_usec) {
                    return result.map_err(|()| PktioError::Transport);
                }
            }
        }

        let n = self.recv(queue, packets)?;
        if n > 0 || wait_usec == NO_WAIT {
            return Ok(n);
        }

        let deadline = (wait_usec != WAIT).then(|| Instant::now() + Duration::from_micros(wait_usec));
        let mut sleeps = 0u64;
        loop {
            std::thread::sleep(Duration::from_micros(SLEEP_USEC));
            let n = self.recv(queue, packets)?;
            if n > 0 {
                return Ok(n);
            }
            sleeps += 1;
            if sleeps % SLEEP_CHECK == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Ok(0);
                    }
                }
            }
        }
    }

    /// Multi-queue timed receive (spec §4.4 "Multi-queue timed receive"):
    /// polls each of `queues` in order, returning the count and the index
    /// (within `queues`) of the queue that produced it. Returns `(0, None)`
    /// immediately if `queues` is empty, to avoid spinning forever on
    /// nothing to poll.
    ///
    /// This core's `Driver` trait has no per-queue interrupt-driven
    /// pre-check to race against the poll loop the way the original's
    /// scheduler can; every queue is plain-polled. Documented as a
    /// narrowing, not a silent drop (spec §4.4).
    pub fn recv_mq_tmo(
        &self,
        queues: &[PktInQueue],
        packets: &mut [Option<Packet>],
        wait_usec: u64,
    ) -> Result<(usize, Option<usize>), PktioError> {
        if queues.is_empty() {
            return Ok((0, None));
        }

        let poll_once = |packets: &mut [Option<Packet>]| -> Result<(usize, Option<usize>), PktioError> {
            for (i, &q) in queues.iter().enumerate() {
                let n = self.recv(q, packets)?;
                if n > 0 {
                    return Ok((n, Some(i)));
                }
            }
            Ok((0, None))
        };

        let (n, from) = poll_once(packets)?;
        if n > 0 || wait_usec == NO_WAIT {
            return Ok((n, from));
        }

        let deadline = (wait_usec != WAIT).then(|| Instant::now() + Duration::from_micros(wait_usec));
        let mut sleeps = 0u64;
        loop {
            std::thread::sleep(Duration::from_micros(SLEEP_USEC));
            let (n, from) = poll_once(packets)?;
            if n > 0 {
                return Ok((n, from));
            }
            sleeps += 1;
            if sleeps % SLEEP_CHECK == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Ok((0, None));
                    }
                }
            }
        }
    }

    pub fn promisc_mode_set(&self, handle: PktioHandle, enable: bool) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.promisc_mode_set(handle.slot(), enable).map_err(|()| PktioError::NotSupported("promiscuous mode"))
    }

    pub fn promisc_mode(&self, handle: PktioHandle) -> Result<bool, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.promisc_mode_get(handle.slot()).ok_or(PktioError::NotSupported("promiscuous mode"))
    }

    pub fn mac_addr(&self, handle: PktioHandle) -> Result<MacAddr, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.mac_get(handle.slot()).ok_or(PktioError::NotSupported("mac address query"))
    }

    pub fn mac_addr_set(&self, handle: PktioHandle, mac: MacAddr) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.mac_set(handle.slot(), mac).map_err(|()| PktioError::NotSupported("mac address assignment"))
    }

    /// `mtu`, `maxlen_in`, and `maxlen_out` all resolve to the driver's
    /// single `mtu_get` entry — the contract doesn't distinguish receive
    /// from transmit maximum lengths the way the original's separate
    /// accessors do, since this core's `Driver` trait exposes only one MTU
    /// query (see DESIGN.md).
    pub fn mtu(&self, handle: PktioHandle) -> Result<u32, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.mtu_get(handle.slot()).ok_or(PktioError::NotSupported("mtu query"))
    }

    pub fn maxlen_in(&self, handle: PktioHandle) -> Result<u32, PktioError> {
        self.mtu(handle)
    }

    pub fn maxlen_out(&self, handle: PktioHandle) -> Result<u32, PktioError> {
        self.mtu(handle)
    }

    pub fn link_status(&self, handle: PktioHandle) -> Result<LinkStatus, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        Ok(driver.link_status(handle.slot()))
    }

    pub fn capability(&self, handle: PktioHandle) -> Result<DriverCapability, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        Ok(driver.capability(handle.slot()))
    }

    pub fn stats(&self, handle: PktioHandle) -> Result<DeviceStats, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        Ok(DeviceStats { driver: driver.stats(handle.slot()), in_discards: slot.in_discards.load(Ordering::Relaxed) })
    }

    pub fn stats_reset(&self, handle: PktioHandle) -> Result<(), PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, _tx) = slot.lock_both();
        let driver = rx.driver.as_ref().ok_or(PktioError::WrongState("slot not opened"))?;
        driver.stats_reset(handle.slot());
        slot.in_discards.store(0, Ordering::Relaxed);
        Ok(())
    }

    pub fn info(&self, handle: PktioHandle) -> Result<DeviceInfo, PktioError> {
        let slot = self.slot_ref(handle.slot())?;
        let (rx, tx) = slot.lock_both();
        Ok(DeviceInfo {
            name: rx.name.clone().unwrap_or_default(),
            state: rx.state,
            in_mode: rx.in_mode,
            out_mode: tx.out_mode,
            num_in_queues: rx.input_queues.len() as u32,
            num_out_queues: tx.output_queues.len() as u32,
        })
    }

    pub fn print(&self, handle: PktioHandle) {
        if let Ok(info) = self.info(handle) {
            println!(
                "pktio {:?}: name={} in_mode={:?} out_mode={:?} in_queues={} out_queues={}",
                handle, info.name, info.in_mode, info.out_mode, info.num_in_queues, info.num_out_queues
            );
        }
        if let Ok(slot) = self.slot_ref(handle.slot()) {
            let (rx, _tx) = slot.lock_both();
            if let Some(driver) = rx.driver.as_ref() {
                driver.print(handle.slot());
            }
        }
    }

    /// For each slot still allocated: stop it if STARTED, close it if
    /// STOPPED or OPENED, then call every driver's `term_global` (spec §4.4
    /// `term_global`). Slots parked in STOP_PENDING/CLOSE_PENDING are left
    /// for the scheduler bridge to finalize — global teardown never blocks
    /// waiting on it (spec §5 "no other operation is permitted to block...
    /// while holding a slot lock").
    pub fn term_global(&self) {
        for idx in 0..self.slots.len() {
            let handle = PktioHandle::from_slot(idx);
            let state = { let (rx, _tx) = self.slots[idx].lock_both(); rx.state };
            if state == DeviceState::Started {
                let _ = self.stop(handle);
            }
            let state = { let (rx, _tx) = self.slots[idx].lock_both(); rx.state };
            if matches!(state, DeviceState::Stopped | DeviceState::Opened) {
                let _ = self.close(handle);
            }
        }
        for driver in &self.drivers {
            driver.term_global();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverStats;
    use std::sync::Mutex;

    struct LoopDriver {
        prefix: &'static str,
        closes: Mutex<u32>,
    }

    impl LoopDriver {
        fn new(prefix: &'static str) -> Self {
            Self { prefix, closes: Mutex::new(0) }
        }
    }

    impl Driver for LoopDriver {
        fn name(&self) -> &str {
            "loop"
        }

        fn open(&self, _slot: usize, name: &str, _pool: Option<&PoolHandle>) -> Result<(), OpenReject> {
            if name.starts_with(self.prefix) {
                Ok(())
            } else {
                Err(OpenReject::NotMine)
            }
        }

        fn close(&self, _slot: usize) {
            *self.closes.lock().unwrap() += 1;
        }

        fn recv(&self, _slot: usize, _queue_idx: u32, _packets: &mut [Option<Packet>]) -> Result<usize, ()> {
            Ok(0)
        }

        fn send(&self, _slot: usize, _queue_idx: u32, packets: &[Packet]) -> Result<usize, ()> {
            Ok(packets.len())
        }

        fn stats(&self, _slot: usize) -> DriverStats {
            DriverStats::default()
        }
    }

    struct NullDriver;
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
        fn send(&self, _slot: usize, _queue_idx: u32, packets: &[Packet]) -> Result<usize, ()> {
            Ok(packets.len())
        }
    }

    fn table_with_loop() -> DeviceTable {
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(NullDriver), Arc::new(LoopDriver::new("loop"))];
        DeviceTable::new(4, drivers, Arc::new(PoolRegistry::new()))
    }

    #[test]
    fn open_start_stop_close_direct_roundtrip() {
        let table = table_with_loop();
        let handle = table.open("loop0", None, OpenParams::default()).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 2, ..Default::default() }).unwrap();
        table.output_queue_config(handle, PktoutQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();
        assert!(matches!(table.link_status(handle), Ok(LinkStatus::Down)));
        table.stop(handle).unwrap();
        table.close(handle).unwrap();
        assert_eq!(table.lookup("loop0"), None);
    }

    #[test]
    fn open_rejects_name_no_driver_claims() {
        let table = table_with_loop();
        assert!(table.open("eth0", None, OpenParams::default()).is_err());
        assert_eq!(table.lookup("eth0"), None);
    }

    #[test]
    fn duplicate_name_open_fails_inuse() {
        let table = table_with_loop();
        let _handle = table.open("loop0", None, OpenParams::default()).unwrap();
        let err = table.open("loop0", None, OpenParams::default()).unwrap_err();
        assert_eq!(err, PktioError::InUse("name already bound"));
    }

    #[test]
    fn scheduled_mode_start_requires_input_queue() {
        let table = table_with_loop();
        let handle =
            table.open("loop1", None, OpenParams { in_mode: InMode::Scheduled, out_mode: OutMode::Direct }).unwrap();
        assert!(table.start(handle).is_err());
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();
    }

    #[test]
    fn scheduled_mode_stop_then_finalize_reaches_stopped() {
        let table = table_with_loop();
        let handle =
            table.open("loop2", None, OpenParams { in_mode: InMode::Scheduled, out_mode: OutMode::Direct }).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();
        table.stop(handle).unwrap();
        assert_eq!(table.info(handle).unwrap().state, DeviceState::StopPending);
        crate::scheduler::sched_cb_pktio_stop_finalize(&table, handle.slot()).unwrap();
        assert_eq!(table.info(handle).unwrap().state, DeviceState::Stopped);
    }

    #[test]
    fn close_requires_stopped_or_opened() {
        let table = table_with_loop();
        let handle = table.open("loop3", None, OpenParams::default()).unwrap();
        table.start(handle).unwrap();
        assert_eq!(table.close(handle).unwrap_err(), PktioError::WrongState("close requires STOPPED or OPENED"));
    }

    #[test]
    fn name_reusable_after_close() {
        let table = table_with_loop();
        let handle = table.open("loopx", None, OpenParams::default()).unwrap();
        table.close(handle).unwrap();
        let handle2 = table.open("loopx", None, OpenParams::default()).unwrap();
        assert_eq!(handle2.slot(), handle.slot());
    }

    #[test]
    fn pktin_queue_returns_direct_mode_handles_only() {
        let table = table_with_loop();
        let handle = table.open("loop4", None, OpenParams::default()).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 2, ..Default::default() }).unwrap();

        let mut out = [PktInQueue::new(handle, 0); 4];
        assert_eq!(table.pktin_queue(handle, &mut out).unwrap(), 2);
        assert_eq!(out[0].index(), 0);
        assert_eq!(out[1].index(), 1);
        assert_eq!(table.pktin_event_queue(handle, &mut out).unwrap(), 0);
    }

    #[test]
    fn pktin_event_queue_returns_scheduled_mode_handles_only() {
        let table = table_with_loop();
        let handle =
            table.open("loop5", None, OpenParams { in_mode: InMode::Scheduled, out_mode: OutMode::Direct }).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();

        let mut out = [PktInQueue::new(handle, 0); 4];
        assert_eq!(table.pktin_queue(handle, &mut out).unwrap(), 0);
        assert_eq!(table.pktin_event_queue(handle, &mut out).unwrap(), 1);
    }

    #[test]
    fn input_queue_config_is_a_no_op_for_disabled() {
        let table = table_with_loop();
        let handle =
            table.open("loop6", None, OpenParams { in_mode: InMode::Disabled, out_mode: OutMode::Direct }).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 3, ..Default::default() }).unwrap();
        assert_eq!(table.info(handle).unwrap().num_in_queues, 0);
    }

    #[test]
    fn output_queue_config_is_a_no_op_for_tm_and_disabled() {
        let table = table_with_loop();
        let handle =
            table.open("loop7", None, OpenParams { in_mode: InMode::Direct, out_mode: OutMode::Tm }).unwrap();
        table.output_queue_config(handle, PktoutQueueParam { num_queues: 3, ..Default::default() }).unwrap();
        assert_eq!(table.info(handle).unwrap().num_out_queues, 0);

        let mut out = [PktOutQueue::new(handle, 0); 4];
        assert_eq!(table.pktout_queue(handle, &mut out).unwrap(), 0);
    }

    #[test]
    fn recv_and_send_reach_the_driver() {
        let table = table_with_loop();
        let handle = table.open("loop8", None, OpenParams::default()).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.output_queue_config(handle, PktoutQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();

        let in_queue = PktInQueue::new(handle, 0);
        let mut buf: [Option<Packet>; 4] = [None; 4];
        assert_eq!(table.recv(in_queue, &mut buf).unwrap(), 0);

        let out_queue = PktOutQueue::new(handle, 0);
        assert_eq!(table.send(out_queue, &[]).unwrap(), 0);
    }

    #[test]
    fn recv_tmo_no_wait_returns_immediately() {
        let table = table_with_loop();
        let handle = table.open("loop9", None, OpenParams::default()).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();

        let queue = PktInQueue::new(handle, 0);
        let mut buf: [Option<Packet>; 4] = [None; 4];
        assert_eq!(table.recv_tmo(queue, &mut buf, NO_WAIT).unwrap(), 0);
    }

    #[test]
    fn recv_tmo_short_wait_times_out_with_no_data() {
        let table = table_with_loop();
        let handle = table.open("loop10", None, OpenParams::default()).unwrap();
        table.input_queue_config(handle, PktinQueueParam { num_queues: 1, ..Default::default() }).unwrap();
        table.start(handle).unwrap();

        let queue = PktInQueue::new(handle, 0);
        let mut buf: [Option<Packet>; 4] = [None; 4];
        assert_eq!(table.recv_tmo(queue, &mut buf, 50).unwrap(), 0);
    }

    #[test]
    fn recv_mq_tmo_empty_queue_list_returns_immediately() {
        let table = table_with_loop();
        let mut buf: [Option<Packet>; 4] = [None; 4];
        assert_eq!(table.recv_mq_tmo(&[], &mut buf, WAIT).unwrap(), (0, None));
    }
}
