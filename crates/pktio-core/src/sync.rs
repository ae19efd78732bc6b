//! Hand-rolled spinning locks for the device table.
//!
//! Two distinct primitives, matching spec §4.4's locking discipline:
//! - [`Spinlock`] — plain CAS spin mutex, not FIFO. Used for the single
//!   table-wide lock that guards slot allocation and the name index; held
//!   only briefly (no driver calls happen under it), so unfairness under
//!   contention is not a concern.
//! - [`TicketLock`] — FIFO ticket lock. Used for each slot's `rxl`/`txl`
//!   locks, which *can* be held across a driver call (`open`, `start`,
//!   `stop`); FIFO ordering bounds how long any one opener waits.
//!
//! Both are user-space spins (no IRQ masking, no preemption guard, no
//! poisoning) — a deliberate simplification of the kernel `IrqMutex`/
//! `IrqRwLock` pair this is grounded on, since nothing here runs in
//! interrupt context.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Plain CAS spin mutex.
pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self { locked: AtomicBool::new(false), data: UnsafeCell::new(data) }
    }

    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        SpinlockGuard { lock: self }
    }
}

impl<'a, T> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// FIFO ticket lock: each acquirer takes a monotonically increasing ticket
/// and spins until `now_serving` matches, so lock order matches request
/// order under contention.
pub struct TicketLock<T> {
    next_ticket: AtomicU32,
    now_serving: AtomicU32,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for TicketLock<T> {}
unsafe impl<T: Send> Sync for TicketLock<T> {}

pub struct TicketLockGuard<'a, T> {
    lock: &'a TicketLock<T>,
}

impl<T> TicketLock<T> {
    pub const fn new(data: T) -> Self {
        Self { next_ticket: AtomicU32::new(0), now_serving: AtomicU32::new(0), data: UnsafeCell::new(data) }
    }

    pub fn lock(&self) -> TicketLockGuard<'_, T> {
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        loop {
            let serving = self.now_serving.load(Ordering::Acquire);
            if serving == my_ticket {
                break;
            }
            let distance = my_ticket.wrapping_sub(serving).min(64);
            for _ in 0..distance {
                spin_loop();
            }
        }
        TicketLockGuard { lock: self }
    }
}

impl<'a, T> Deref for TicketLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for TicketLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for TicketLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.now_serving.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn spinlock_serializes_increments() {
        let lock = Arc::new(Spinlock::new(0u64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(*lock.lock(), 80_000);
    }

    #[test]
    fn ticket_lock_serializes_increments() {
        let lock = Arc::new(TicketLock::new(0u64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(*lock.lock(), 80_000);
    }

    #[test]
    fn ticket_lock_grants_fifo_order() {
        use std::sync::mpsc;
        let lock = Arc::new(TicketLock::new(()));
        let (tx, rx) = mpsc::channel();
        let first = lock.lock();

        let lock2 = Arc::clone(&lock);
        let tx2 = tx.clone();
        let waiter = thread::spawn(move || {
            let _guard = lock2.lock();
            tx2.send(2).unwrap();
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        tx.send(1).unwrap();
        drop(first);
        waiter.join().unwrap();

        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }
}
