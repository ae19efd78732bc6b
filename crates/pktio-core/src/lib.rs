//! Packet-I/O device table: the driver plugin interface, the per-slot state
//! machine, and the scheduler-facing bridge callbacks (spec §4.3–§4.4 and
//! §6). Buffer allocation itself lives in `pktio-pool`; this crate only
//! consumes it through [`pktio_pool::PoolRegistry`].

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod handle;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod table;

pub use config::{
    wait_time, OpenParams, PktinQueueParam, PktioConfig, PktoutQueueParam, QueueOpMode, MAX_NAME_LEN, NO_WAIT, WAIT,
};
pub use driver::{Driver, DriverCapability, DriverStats, LinkStatus, MacAddr, OpenReject, Packet};
pub use error::PktioError;
pub use handle::PktioHandle;
pub use queue::{InMode, InputQueue, OutMode, OutputQueue, PktInQueue, PktOutQueue};
pub use scheduler::{sched_cb_pktin_poll, sched_cb_pktin_poll_one, sched_cb_pktio_stop_finalize};
pub use table::{DeviceInfo, DeviceStats, DeviceTable};

pub use device::DeviceState;

#[cfg(test)]
mod lib_tests {
    use super::*;
    use pktio_pool::PoolRegistry;
    use std::sync::Arc;

    #[test]
    fn device_table_starts_with_no_interfaces_bound() {
        let table = DeviceTable::new(8, Vec::new(), Arc::new(PoolRegistry::new()));
        assert_eq!(table.lookup("anything"), None);
        assert_eq!(table.max_index(), 8);
    }
}
