//! Fixed-capacity table of pool slots, guarded by a single table-wide lock
//! (spec §4.2 `create`/`destroy`/`lookup`; mirrors the device table's
//! table-spinlock-for-allocation, per-slot-lock-for-everything-else split
//! described for pktio-core, scaled down to the pool's simpler lifecycle).

use crate::config::{PoolCapability, PoolParams, MAX_POOLS};
use crate::error::PoolError;
use crate::pool::{Pool, PoolInfo};
use std::sync::{Mutex, RwLock};

/// Handle to a pool reserved in a [`PoolRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(u32);

impl PoolHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The registry of all pools, sized per [`PoolCapability::max_pools`].
///
/// Slot allocation and name lookup take the table lock; everything else
/// (alloc/free, info) goes straight through to the `Pool` itself, which does
/// its own fine-grained synchronization.
pub struct PoolRegistry {
    capability: PoolCapability,
    slots: Mutex<Vec<Option<Pool>>>,
    // Mirrors each slot's name so lookup doesn't need a slot lock of its own;
    // kept separate and under its own lock so a long-running `info()` call on
    // one pool never blocks a `lookup` for another.
    names: RwLock<Vec<Option<String>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::with_capability(PoolCapability::default())
    }

    pub fn with_capability(capability: PoolCapability) -> Self {
        let max_pools = capability.max_pools.min(MAX_POOLS);
        let mut slots = Vec::with_capacity(max_pools);
        slots.resize_with(max_pools, || None);
        let mut names = Vec::with_capacity(max_pools);
        names.resize_with(max_pools, || None);
        Self { capability, slots: Mutex::new(slots), names: RwLock::new(names) }
    }

    pub fn capability(&self) -> PoolCapability {
        self.capability
    }

    /// Reserves a slot, validates and instantiates the pool.
    ///
    /// The name-index write lock is held across the whole reservation so
    /// that a concurrent `create` of the same name cannot slip in between
    /// the uniqueness check and the slot write (exactly-once naming).
    pub fn create(&self, name: &str, params: PoolParams) -> Result<PoolHandle, PoolError> {
        let mut names = self.names.write().unwrap();
        if names.iter().any(|n| n.as_deref() == Some(name)) {
            return Err(PoolError::BadParams("pool name already bound"));
        }

        let mut slots = self.slots.lock().unwrap();
        let index = slots
            .iter()
            .position(Option::is_none)
            .ok_or(PoolError::NoSlot)? as u32;

        let pool = Pool::create(index, name, params, &self.capability)?;
        slots[index as usize] = Some(pool);
        names[index as usize] = Some(name.to_owned());
        Ok(PoolHandle(index))
    }

    /// Drains per-thread caches, verifies nothing is outstanding, and frees the slot.
    pub fn destroy(&self, handle: PoolHandle) -> Result<(), PoolError> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.get_mut(handle.0 as usize).ok_or(PoolError::BadParams("invalid pool handle"))?;
        let pool = slot.as_ref().ok_or(PoolError::BadParams("pool not reserved"))?;
        pool.prepare_destroy()?;
        *slot = None;
        drop(slots);

        self.names.write().unwrap()[handle.0 as usize] = None;
        Ok(())
    }

    /// Linear scan under the name index lock (spec §4.2 `lookup`).
    pub fn lookup(&self, name: &str) -> Option<PoolHandle> {
        let names = self.names.read().unwrap();
        names.iter().position(|n| n.as_deref() == Some(name)).map(|i| PoolHandle(i as u32))
    }

    pub fn alloc(&self, handle: PoolHandle) -> Option<crate::pool::BufferHandle> {
        self.with_pool(handle, Pool::alloc).flatten()
    }

    pub fn alloc_multi(&self, handle: PoolHandle, n: usize) -> Vec<crate::pool::BufferHandle> {
        self.with_pool(handle, |pool| pool.alloc_multi(n)).unwrap_or_default()
    }

    pub fn free(&self, handle: PoolHandle, buffer: crate::pool::BufferHandle) {
        self.with_pool(handle, |pool| pool.free(buffer));
    }

    pub fn free_multi(&self, handle: PoolHandle, buffers: &[crate::pool::BufferHandle]) {
        self.with_pool(handle, |pool| pool.free_multi(buffers));
    }

    pub fn info(&self, handle: PoolHandle) -> Option<PoolInfo> {
        self.with_pool(handle, Pool::info)
    }

    pub fn print(&self, handle: PoolHandle) {
        self.with_pool(handle, Pool::print);
    }

    fn with_pool<R>(&self, handle: PoolHandle, f: impl FnOnce(&Pool) -> R) -> Option<R> {
        let slots = self.slots.lock().unwrap();
        slots.get(handle.0 as usize)?.as_ref().map(f)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lookup_destroy_roundtrip() {
        let registry = PoolRegistry::new();
        let handle = registry.create("pkt", PoolParams::packet(32, 1500)).unwrap();
        assert_eq!(registry.lookup("pkt"), Some(handle));
        registry.destroy(handle).unwrap();
        assert_eq!(registry.lookup("pkt"), None);
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = PoolRegistry::new();
        registry.create("dup", PoolParams::raw(8, 64)).unwrap();
        assert!(registry.create("dup", PoolParams::raw(8, 64)).is_err());
    }

    #[test]
    fn slots_exhaust_and_free() {
        let capability = PoolCapability { max_pools: 2, ..PoolCapability::default() };
        let registry = PoolRegistry::with_capability(capability);
        let a = registry.create("a", PoolParams::raw(4, 64)).unwrap();
        let _b = registry.create("b", PoolParams::raw(4, 64)).unwrap();
        assert!(matches!(registry.create("c", PoolParams::raw(4, 64)), Err(PoolError::NoSlot)));

        registry.destroy(a).unwrap();
        assert!(registry.create("c", PoolParams::raw(4, 64)).is_ok());
    }

    #[test]
    fn alloc_free_through_registry() {
        let registry = PoolRegistry::new();
        let handle = registry.create("p", PoolParams::raw(4, 64)).unwrap();
        let buf = registry.alloc(handle).unwrap();
        registry.free(handle, buf);
        assert_eq!(registry.info(handle).unwrap().free_count, 4);
    }
}
