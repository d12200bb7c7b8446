//! Change tracking with explicit listener notification.
//!
//! A [`ChangeFlag`] carries a `changed` bit and a set of listeners. Setting the
//! bit does nothing by itself; [`ChangeFlag::notify`] delivers one event to
//! every listener (most recently added first) and clears the bit.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Handle returned by [`ChangeFlag::add_listener`], used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Thread-safe changed bit with listeners receiving an `A` on notify.
pub struct ChangeFlag<A> {
    changed: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<A>)>>,
}

impl<A> Default for ChangeFlag<A> {
    fn default() -> Self {
        Self {
            changed: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<A> ChangeFlag<A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn set_changed(&self) {
        self.changed.store(true, Ordering::SeqCst);
    }

    pub fn set_changed_to(&self, changed: bool) {
        self.changed.store(changed, Ordering::SeqCst);
    }

    pub fn clear_changed(&self) {
        self.changed.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed.load(Ordering::SeqCst)
    }

    /// Deliver `arg` to every listener if the flag is set, then clear it.
    ///
    /// Listeners run outside the internal lock, so they may add or remove
    /// listeners; such changes apply from the next notification.
    pub fn notify(&self, arg: &A) {
        if !self.changed.swap(false, Ordering::SeqCst) {
            return;
        }
        let snapshot: Vec<Listener<A>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot.iter().rev() {
            listener(arg);
        }
    }
}
