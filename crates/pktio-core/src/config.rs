//! Config/param structs (spec §9 "Config/param structs"): explicit default
//! constructors rather than relying on zero-value semantics.

use crate::queue::{InMode, OutMode};

/// Bounded interface-name length (spec §3 "printable identifier, bounded
/// length"). The original doesn't fix a value the distillation carried
/// forward verbatim, so this is a deliberate, documented choice rather than
/// a recovered constant.
pub const MAX_NAME_LEN: usize = 64;

/// Backing-ring capacity for a queued/scheduled input queue absent any
/// driver-specific hint. Rounded up to a power of two by `RingConfig`.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Wait sentinel: `recv_tmo`/`recv_mq_tmo` return immediately with whatever
/// is already available (spec §6 "Wait sentinels", §8 boundary behavior).
pub const NO_WAIT: u64 = 0;

/// Wait sentinel: `recv_tmo`/`recv_mq_tmo` never time out (spec §6 "Wait
/// sentinels", §8 boundary behavior).
pub const WAIT: u64 = u64::MAX;

/// Converts a nanosecond budget to the microsecond units `recv_tmo` takes,
/// rounding up so a sub-microsecond budget still waits at least one
/// microsecond (spec §6 "Wait sentinels").
pub fn wait_time(nsec: u64) -> u64 {
    nsec / 1000 + 1
}

/// Whether a queue's per-queue data path is single-user or must take its
/// own lock (spec §4.4 "a flag in the queue-config params names whether the
/// driver's per-queue path is single-user or must take its own ticket
/// lock"). Carried through to the driver but not interpreted by the core —
/// concrete per-queue locking is the driver's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOpMode {
    /// Multiple threads may touch the queue concurrently.
    Mt,
    /// Exactly one thread will ever touch the queue.
    St,
}

impl Default for QueueOpMode {
    fn default() -> Self {
        QueueOpMode::Mt
    }
}

/// Parameters to [`crate::table::DeviceTable::open`].
#[derive(Debug, Clone, Copy)]
pub struct OpenParams {
    pub in_mode: InMode,
    pub out_mode: OutMode,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self { in_mode: InMode::Direct, out_mode: OutMode::Direct }
    }
}

/// Parameters to [`crate::table::DeviceTable::config`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PktioConfig {
    pub feature_bits: u64,
}

/// Parameters to [`crate::table::DeviceTable::input_queue_config`].
#[derive(Debug, Clone, Copy)]
pub struct PktinQueueParam {
    pub num_queues: u32,
    pub op_mode: QueueOpMode,
    pub classifier_enable: bool,
}

impl Default for PktinQueueParam {
    fn default() -> Self {
        Self { num_queues: 1, op_mode: QueueOpMode::Mt, classifier_enable: false }
    }
}

/// Parameters to [`crate::table::DeviceTable::output_queue_config`].
#[derive(Debug, Clone, Copy)]
pub struct PktoutQueueParam {
    pub num_queues: u32,
    pub op_mode: QueueOpMode,
}

impl Default for PktoutQueueParam {
    fn default() -> Self {
        Self { num_queues: 1, op_mode: QueueOpMode::Mt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_time_rounds_up() {
        assert_eq!(wait_time(0), 1);
        assert_eq!(wait_time(1), 1);
        assert_eq!(wait_time(1_000), 2);
        assert_eq!(wait_time(1_999), 2);
    }
}
