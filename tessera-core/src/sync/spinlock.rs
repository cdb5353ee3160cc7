//! Spinning reader/writer lock with an explicit upgrade path.

// Layer 1: Standard library imports
use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI64, Ordering};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// Flag value marking a single exclusive holder.
const EXCLUSIVE: i64 = i64::MIN;

/// Spinning reader/writer lock guarding a value of type `T`.
///
/// A single atomic word encodes the lock state:
///
/// | value     | meaning              |
/// |-----------|----------------------|
/// | `0`       | unlocked             |
/// | `n > 0`   | `n` shared holders   |
/// | `i64::MIN`| one exclusive holder |
///
/// All operations spin; none issue a syscall. Critical sections guarded by
/// this lock must therefore stay short and must never call back into code
/// that acquires the same lock - nested acquisition spins forever.
///
/// # Upgrading
///
/// [`SpinUpgradeGuard::upgrade`] releases the shared hold and then acquires
/// the lock exclusively. The two steps are **not** atomic: another writer
/// may run in between, so callers must re-validate whatever they read under
/// the shared hold after upgrading.
///
/// # Example
///
/// ```rust
/// use tessera_core::sync::SharedSpinlock;
///
/// let lock = SharedSpinlock::new(vec![1, 2, 3]);
///
/// {
///     let guard = lock.read();
///     assert_eq!(guard.len(), 3);
/// }
///
/// lock.write().push(4);
/// assert_eq!(lock.read().len(), 4);
/// ```
pub struct SharedSpinlock<T> {
    flag: AtomicI64,
    value: UnsafeCell<T>,
}

// The lock serializes all access to `value`.
unsafe impl<T: Send> Send for SharedSpinlock<T> {}
unsafe impl<T: Send + Sync> Sync for SharedSpinlock<T> {}

impl<T> SharedSpinlock<T> {
    /// Create an unlocked spinlock guarding `value`.
    pub fn new(value: T) -> Self {
        Self {
            flag: AtomicI64::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Consume the lock and return the guarded value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Acquire the lock exclusively, spinning until available.
    pub fn write(&self) -> SpinWriteGuard<'_, T> {
        self.lock_exclusive();
        SpinWriteGuard { lock: self }
    }

    /// One-shot attempt to acquire the lock exclusively.
    pub fn try_write(&self) -> Option<SpinWriteGuard<'_, T>> {
        let v = self.flag.load(Ordering::Relaxed);
        if v == 0
            && self
                .flag
                .compare_exchange(0, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            Some(SpinWriteGuard { lock: self })
        } else {
            None
        }
    }

    /// Acquire the lock in shared mode, spinning until no writer holds it.
    pub fn read(&self) -> SpinReadGuard<'_, T> {
        self.lock_shared();
        SpinReadGuard { lock: self }
    }

    /// One-shot attempt to acquire the lock in shared mode.
    pub fn try_read(&self) -> Option<SpinReadGuard<'_, T>> {
        let v = self.flag.load(Ordering::Relaxed);
        if v >= 0
            && self
                .flag
                .compare_exchange(v, v + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            Some(SpinReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Acquire the lock in shared mode with the option to upgrade later.
    pub fn upgradable_read(&self) -> SpinUpgradeGuard<'_, T> {
        self.lock_shared();
        SpinUpgradeGuard { lock: self }
    }

    fn lock_exclusive(&self) {
        let mut v = self.flag.load(Ordering::Relaxed);
        loop {
            if v != 0 {
                hint::spin_loop();
                v = self.flag.load(Ordering::Relaxed);
            } else if self
                .flag
                .compare_exchange_weak(0, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            // else: next iteration
        }
    }

    fn lock_shared(&self) {
        let mut v = self.flag.load(Ordering::Relaxed);
        loop {
            if v < 0 {
                hint::spin_loop();
                v = self.flag.load(Ordering::Relaxed);
            } else if self
                .flag
                .compare_exchange_weak(v, v + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            } else {
                v = self.flag.load(Ordering::Relaxed);
            }
        }
    }

    fn unlock_exclusive(&self) {
        debug_assert_eq!(self.flag.load(Ordering::Relaxed), EXCLUSIVE);
        self.flag.store(0, Ordering::Release);
    }

    fn unlock_shared(&self) {
        let prev = self.flag.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "shared unlock without shared hold");
    }
}

impl<T: Default> Default for SharedSpinlock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedSpinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_tuple("SharedSpinlock").field(&*guard).finish(),
            None => f.write_str("SharedSpinlock(<locked>)"),
        }
    }
}

/// Shared (read) guard. Releases the shared hold on drop.
pub struct SpinReadGuard<'a, T> {
    lock: &'a SharedSpinlock<T>,
}

impl<T> Deref for SpinReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: shared holders exclude writers.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for SpinReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_shared();
    }
}

/// Exclusive (write) guard. Releases the lock on drop.
pub struct SpinWriteGuard<'a, T> {
    lock: &'a SharedSpinlock<T>,
}

impl<T> Deref for SpinWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: exclusive holder excludes all others.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: exclusive holder excludes all others.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_exclusive();
    }
}

/// Shared guard that can trade its hold for an exclusive one.
///
/// Used on paths that usually only read but occasionally mutate: acquire in
/// shared mode, inspect, and call [`upgrade`](Self::upgrade) when a write
/// turns out to be necessary.
pub struct SpinUpgradeGuard<'a, T> {
    lock: &'a SharedSpinlock<T>,
}

impl<'a, T> SpinUpgradeGuard<'a, T> {
    /// Trade the shared hold for an exclusive one.
    ///
    /// **Not atomic**: the shared hold is released before the exclusive
    /// acquisition, so another writer may run in between. Re-validate any
    /// state read under the shared hold before relying on it.
    pub fn upgrade(self) -> SpinWriteGuard<'a, T> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.unlock_shared();
        lock.lock_exclusive();
        SpinWriteGuard { lock }
    }

    /// Release the shared hold without upgrading.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Deref for SpinUpgradeGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: shared holders exclude writers.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for SpinUpgradeGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_shared();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_read_write_roundtrip() {
        let lock = SharedSpinlock::new(0u64);
        *lock.write() += 41;
        *lock.write() += 1;
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn test_multiple_readers() {
        let lock = SharedSpinlock::new(7u32);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a, 7);
        assert_eq!(*b, 7);
        // A writer must not get in while readers hold the lock.
        assert!(lock.try_write().is_none());
    }

    #[test]
    fn test_try_read_blocked_by_writer() {
        let lock = SharedSpinlock::new(());
        let guard = lock.write();
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(guard);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_upgrade_restores_unlocked_state() {
        let lock = SharedSpinlock::new(1u32);
        let guard = lock.upgradable_read();
        assert_eq!(*guard, 1);
        let mut wguard = guard.upgrade();
        *wguard = 2;
        drop(wguard);
        // flag must be back to zero: both modes acquirable again
        assert!(lock.try_write().is_some());
        assert_eq!(*lock.read(), 2);
    }

    #[test]
    fn test_writers_never_observe_partial_writes() {
        let lock = Arc::new(SharedSpinlock::new((0u64, 0u64)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = lock.write();
                    guard.0 += 1;
                    guard.1 += 1;
                }
            }));
        }
        let reader = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let guard = lock.read();
                    // both halves always advance together
                    assert_eq!(guard.0, guard.1);
                }
            })
        };
        for h in handles {
            h.join().unwrap();
        }
        reader.join().unwrap();
        let total = lock.read();
        assert_eq!(total.0, 4000);
        assert_eq!(total.1, 4000);
    }

    #[test]
    fn test_exclusive_excludes_shared() {
        let lock = Arc::new(SharedSpinlock::new(0i64));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let mut guard = lock.write();
                    let seen = *guard;
                    *guard = seen + 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 2000);
    }
}
