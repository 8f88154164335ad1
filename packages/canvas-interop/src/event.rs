//! Event subscriptions with an owned unregistration obligation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{InteropError, Result};

type Unsubscribe = Box<dyn FnOnce() -> Result<()> + Send>;

/// A live subscription. Dropping it unsubscribes.
///
/// Unsubscribe failures are swallowed: during teardown the event source is routinely
/// destroyed before the subscriber, and that is not something the caller can act on.
#[must_use = "dropping a RegisteredEvent unsubscribes immediately"]
pub struct RegisteredEvent {
    unsubscribe: Option<Unsubscribe>,
}

impl RegisteredEvent {
    pub fn new<H, T>(
        handler: H,
        subscribe: impl FnOnce(H) -> Result<T>,
        unsubscribe: impl FnOnce(T) -> Result<()> + Send + 'static,
    ) -> Result<Self>
    where
        T: Send + 'static,
    {
        let token = subscribe(handler)?;
        Ok(Self {
            unsubscribe: Some(Box::new(move || unsubscribe(token))),
        })
    }

    /// Subscribe to an [`EventSource`], holding the source weakly.
    pub fn subscribe<A: 'static>(
        source: &Arc<EventSource<A>>,
        handler: impl Fn(&A) + Send + Sync + 'static,
    ) -> Result<Self> {
        let weak: Weak<EventSource<A>> = Arc::downgrade(source);
        Self::new(
            handler,
            |handler| Ok(source.add(handler)),
            move |token| match weak.upgrade() {
                Some(source) => source.remove(token),
                None => Err(InteropError::ObjectClosed),
            },
        )
    }

    pub fn is_registered(&self) -> bool {
        self.unsubscribe.is_some()
    }

    /// End the subscription now. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            if let Err(err) = unsubscribe() {
                warn!("ignoring event unregistration failure: {err}");
            }
        }
    }

    /// Drop the obligation to unsubscribe without unsubscribing.
    pub fn detach(&mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for RegisteredEvent {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(u64);

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub struct EventSource<A> {
    next_token: AtomicU64,
    handlers: Mutex<Vec<(EventToken, Handler<A>)>>,
}

impl<A> Default for EventSource<A> {
    fn default() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<A> EventSource<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: impl Fn(&A) + Send + Sync + 'static) -> EventToken {
        let token = EventToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((token, Arc::new(handler)));
        trace!(?token, "event handler added");
        token
    }

    pub fn remove(&self, token: EventToken) -> Result<()> {
        let mut handlers = self.handlers.lock();
        let index = handlers
            .iter()
            .position(|(t, _)| *t == token)
            .ok_or(InteropError::InvalidArgument("unknown event token"))?;
        handlers.remove(index);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handlers run outside the lock, so they may add or remove handlers themselves.
    pub fn invoke(&self, args: &A) {
        let snapshot: Vec<Handler<A>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in snapshot {
            handler(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_handler(count: Arc<AtomicUsize>) -> impl Fn(&u32) + Send + Sync + 'static {
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn subscribes_on_construction_and_unsubscribes_on_drop() {
        let source = Arc::new(EventSource::<u32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let _event =
                RegisteredEvent::subscribe(&source, counting_handler(hits.clone())).unwrap();
            assert_eq!(source.len(), 1);
            source.invoke(&1);
        }
        assert!(source.is_empty());
        source.invoke(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let unsubscribed = Arc::new(AtomicUsize::new(0));
        let counter = unsubscribed.clone();
        let mut event = RegisteredEvent::new(
            (),
            |_| Ok(42u32),
            move |token| {
                assert_eq!(token, 42);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();
        event.release();
        event.release();
        drop(event);
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_skips_unsubscribe() {
        let source = Arc::new(EventSource::<u32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let mut event =
            RegisteredEvent::subscribe(&source, counting_handler(hits.clone())).unwrap();
        event.detach();
        assert!(!event.is_registered());
        drop(event);
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn unsubscribe_failure_is_swallowed() {
        let source = Arc::new(EventSource::<u32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let event = RegisteredEvent::subscribe(&source, counting_handler(hits.clone())).unwrap();
        drop(source);
        drop(event);
    }

    #[test]
    fn failed_subscribe_creates_no_lease() {
        let result = RegisteredEvent::new(
            (),
            |_| Err::<u32, _>(InteropError::InvalidArgument("no source")),
            |_| Ok(()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn removing_an_unknown_token_fails() {
        let source = EventSource::<u32>::new();
        let token = source.add(|_| {});
        source.remove(token).unwrap();
        assert_eq!(
            source.remove(token),
            Err(InteropError::InvalidArgument("unknown event token"))
        );
    }
}
