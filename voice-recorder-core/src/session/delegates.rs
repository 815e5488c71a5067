use std::sync::Arc;

use parking_lot::Mutex;

/// Subscriber list for controller notifications.
///
/// A delegate is registered at most once; adding the same `Arc` again is a
/// no-op. Notification runs over a snapshot, so delegates may subscribe or
/// unsubscribe from inside a callback.
pub struct DelegateList<D: ?Sized> {
    delegates: Mutex<Vec<Arc<D>>>,
}

impl<D: ?Sized> DelegateList<D> {
    pub fn new() -> Self {
        Self {
            delegates: Mutex::new(Vec::new()),
        }
    }

    /// Returns `false` if `delegate` was already registered.
    pub fn add(&self, delegate: Arc<D>) -> bool {
        let mut delegates = self.delegates.lock();
        if delegates.iter().any(|d| same_delegate(d, &delegate)) {
            return false;
        }
        delegates.push(delegate);
        true
    }

    /// Returns `false` if `delegate` was not registered.
    pub fn remove(&self, delegate: &Arc<D>) -> bool {
        let mut delegates = self.delegates.lock();
        let before = delegates.len();
        delegates.retain(|d| !same_delegate(d, delegate));
        delegates.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.delegates.lock().len()
    }

    pub fn notify(&self, f: impl Fn(&D)) {
        let snapshot: Vec<Arc<D>> = self.delegates.lock().clone();
        for delegate in &snapshot {
            f(delegate);
        }
    }
}

impl<D: ?Sized> Default for DelegateList<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_delegate<D: ?Sized>(a: &Arc<D>, b: &Arc<D>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
