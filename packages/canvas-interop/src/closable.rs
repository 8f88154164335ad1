use parking_lot::RwLock;

use crate::error::{InteropError, Result};

enum Slot<T> {
    Unassigned,
    Live(T),
    Closed,
}

/// Owning handle to a native reference that can be closed independently of how many
/// owners still hold the handle itself.
///
/// Reads before assignment and after `close` both fail with [`InteropError::ObjectClosed`].
pub struct ClosablePtr<T> {
    slot: RwLock<Slot<T>>,
}

impl<T> Default for ClosablePtr<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(Slot::Unassigned),
        }
    }
}

impl<T> ClosablePtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: RwLock::new(Slot::Live(value)),
        }
    }

    /// Fill an unassigned handle. Closed handles stay closed.
    pub fn assign(&self, value: T) -> Result<()> {
        let mut slot = self.slot.write();
        match *slot {
            Slot::Unassigned => {
                *slot = Slot::Live(value);
                Ok(())
            }
            Slot::Live(_) => Err(InteropError::InvalidArgument("handle is already assigned")),
            Slot::Closed => Err(InteropError::ObjectClosed),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        match &*self.slot.read() {
            Slot::Live(value) => Ok(f(value)),
            Slot::Unassigned | Slot::Closed => Err(InteropError::ObjectClosed),
        }
    }

    /// Returns `true` for the call that performed the transition; later calls are no-ops.
    pub fn close(&self) -> bool {
        let released = {
            let mut slot = self.slot.write();
            if matches!(*slot, Slot::Closed) {
                return false;
            }
            std::mem::replace(&mut *slot, Slot::Closed)
        };
        // Release the native reference after the lock is gone; its destructor may call back in.
        drop(released);
        true
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.slot.read(), Slot::Closed)
    }
}

impl<T: Clone> ClosablePtr<T> {
    pub fn ensure_not_closed(&self) -> Result<T> {
        self.with(T::clone)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountsDrops(Arc<AtomicUsize>);

    impl Drop for CountsDrops {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn reads_succeed_until_closed() {
        let ptr = ClosablePtr::new(Arc::new(7));
        assert_eq!(*ptr.ensure_not_closed().unwrap(), 7);
        assert!(ptr.close());
        assert_eq!(ptr.ensure_not_closed(), Err(InteropError::ObjectClosed));
    }

    #[test]
    fn close_twice_is_a_no_op() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = ClosablePtr::new(Arc::new(CountsDrops(drops.clone())));
        assert!(ptr.close());
        assert!(!ptr.close());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(ptr.ensure_not_closed().is_err());
        assert_eq!(
            ptr.with(|_| ()).unwrap_err(),
            InteropError::ObjectClosed
        );
    }

    #[test]
    fn close_releases_even_with_outstanding_owners() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = Arc::new(ClosablePtr::new(CountsDrops(drops.clone())));
        let other_owner = ptr.clone();
        ptr.close();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(other_owner.is_closed());
    }

    #[test]
    fn unassigned_handle_reports_closed() {
        let ptr: ClosablePtr<Arc<u32>> = ClosablePtr::default();
        assert_eq!(ptr.ensure_not_closed(), Err(InteropError::ObjectClosed));
        assert!(!ptr.is_closed());
        ptr.assign(Arc::new(3)).unwrap();
        assert_eq!(*ptr.ensure_not_closed().unwrap(), 3);
        assert!(ptr.assign(Arc::new(4)).is_err());
    }

    #[test]
    fn assign_after_close_fails() {
        let ptr: ClosablePtr<u32> = ClosablePtr::default();
        ptr.close();
        assert_eq!(ptr.assign(1), Err(InteropError::ObjectClosed));
    }

    #[test]
    fn close_is_visible_to_other_threads() {
        let ptr = Arc::new(ClosablePtr::new(1u32));
        let closer = ptr.clone();
        std::thread::spawn(move || closer.close()).join().unwrap();
        assert!(ptr.ensure_not_closed().is_err());
    }
}
