//! Input/output queue descriptors (spec §3 "Input queue descriptor" /
//! "Output queue descriptor", §4.4 `input_queue_config`/`output_queue_config`).
//!
//! The generic event-queue subsystem itself is out of scope (spec §1); what's
//! modeled here is the shim behavior the device table imposes on top of it:
//! which side (enqueue/dequeue) is overridden versus disabled outright for
//! each mode.

use crate::driver::{Driver, Packet};
use crate::handle::PktioHandle;
use pktio_ring::{Ring, RingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InMode {
    Direct,
    Queued,
    Scheduled,
    /// Input side turned off entirely (spec §6 "Modes").
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutMode {
    Direct,
    Queued,
    /// Traffic-manager output; configuration is a no-op here (spec §6 "Modes").
    Tm,
    /// Output side turned off entirely (spec §6 "Modes").
    Disabled,
}

impl Default for OutMode {
    fn default() -> Self {
        OutMode::Direct
    }
}

/// Opaque handle to one input queue, returned by [`crate::table::DeviceTable::pktin_queue`]/
/// [`crate::table::DeviceTable::pktin_event_queue`] (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PktInQueue {
    device: PktioHandle,
    queue_index: u32,
}

impl PktInQueue {
    pub(crate) fn new(device: PktioHandle, queue_index: u32) -> Self {
        Self { device, queue_index }
    }

    pub fn device(self) -> PktioHandle {
        self.device
    }

    pub fn index(self) -> u32 {
        self.queue_index
    }
}

/// Opaque handle to one output queue, returned by [`crate::table::DeviceTable::pktout_queue`]/
/// [`crate::table::DeviceTable::pktout_event_queue`] (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PktOutQueue {
    device: PktioHandle,
    queue_index: u32,
}

impl PktOutQueue {
    pub(crate) fn new(device: PktioHandle, queue_index: u32) -> Self {
        Self { device, queue_index }
    }

    pub fn device(self) -> PktioHandle {
        self.device
    }

    pub fn index(self) -> u32 {
        self.queue_index
    }
}

/// A direct-poll handle, plus (in queued/scheduled modes) a backing event
/// queue whose dequeue side pulls from the driver on empty and whose
/// enqueue side is forbidden to application code.
///
/// The backing ring stores `Option<Packet>` rather than `Packet` directly:
/// `Packet` has no public constructor outside `pktio-pool`, so there is no
/// way for this crate to build a placeholder buffer to dequeue into. Every
/// slot actually enqueued is `Some`; `None` only ever appears as the initial
/// fill value of a scratch output slice, never as a queued entry.
pub struct InputQueue {
    pub queue_index: u32,
    mode: InMode,
    backing: Option<Ring<Option<Packet>>>,
}

impl InputQueue {
    pub(crate) fn new(queue_index: u32, mode: InMode, capacity: usize) -> Self {
        let backing = match mode {
            InMode::Direct | InMode::Disabled => None,
            InMode::Queued | InMode::Scheduled => Some(Ring::init(RingConfig::for_min_capacity(capacity))),
        };
        Self { queue_index, mode, backing }
    }

    pub fn mode(&self) -> InMode {
        self.mode
    }

    /// Application code pushing directly into a pktin queue is a programming
    /// error — fatal abort, not a returned error (spec §7).
    pub fn enqueue_forbidden(&self) -> ! {
        panic!("enqueue into a pktin queue is a programming error");
    }

    /// Direct mode delegates straight to the driver. Queued/scheduled modes
    /// drain the backing queue first, refilling from the driver on empty
    /// (spec §4.4 "Receive dispatch").
    pub fn recv(&self, driver: &dyn Driver, slot: usize, out: &mut [Option<Packet>]) -> Result<usize, ()> {
        match &self.backing {
            None => driver.recv(slot, self.queue_index, out),
            Some(ring) => {
                let n = ring.dequeue_batch(out);
                if n > 0 {
                    return Ok(n);
                }
                driver.recv(slot, self.queue_index, out)
            }
        }
    }

    pub(crate) fn backing(&self) -> Option<&Ring<Option<Packet>>> {
        self.backing.as_ref()
    }
}

/// A direct-send handle, plus (in queued mode) a backing event queue whose
/// dequeue side is forbidden and whose enqueue side resolves to a send path.
pub struct OutputQueue {
    pub queue_index: u32,
    mode: OutMode,
}

impl OutputQueue {
    pub(crate) fn new(queue_index: u32, mode: OutMode) -> Self {
        Self { queue_index, mode }
    }

    pub fn mode(&self) -> OutMode {
        self.mode
    }

    /// Application code pulling directly from a pktout queue is a
    /// programming error — fatal abort (spec §7).
    pub fn dequeue_forbidden(&self) -> ! {
        panic!("dequeue from a pktout queue is a programming error");
    }

    /// Both modes resolve to the driver's send path here. The original's
    /// ordered-scheduler shim that can intercept a queued-mode send first is
    /// an out-of-scope collaborator (spec §1); this core always falls
    /// through to `driver.send`.
    pub fn send(&self, driver: &dyn Driver, slot: usize, packets: &[Packet]) -> Result<usize, ()> {
        driver.send(slot, self.queue_index, packets)
    }
}
