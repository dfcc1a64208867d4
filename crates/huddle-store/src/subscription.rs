//! Live-push subscription handles

use std::fmt;

/// Identifier assigned to a registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Handle for a live subscription
///
/// Dropping the handle unsubscribes, so a subscription can never outlive the
/// session that owns it.
pub struct Subscription {
    id: SubscriptionId,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create handle with its cancellation hook
    pub fn new(id: SubscriptionId, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle for a store that does not support live pushes
    #[must_use]
    pub fn inert() -> Self {
        Self {
            id: SubscriptionId(0),
            cancel: None,
        }
    }

    /// Subscription id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether cancellation is still pending
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Explicitly unsubscribe
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drop_cancels_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new(SubscriptionId(7), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_unsubscribe_does_not_double_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new(SubscriptionId(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inert_handle_is_inactive() {
        assert!(!Subscription::inert().is_active());
    }
}
