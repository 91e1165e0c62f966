//! In-memory router history
//!
//! Hosts with a real browser history map it onto the same operations; tests
//! and headless hosts use [`MemoryHistory`] directly.

use parking_lot::Mutex;
use scenes_core::events::ListenerTable;
use scenes_core::{Location, Subscription};
use std::fmt;
use std::sync::Arc;

struct Entries {
    stack: Vec<Location>,
    index: usize,
}

/// Stack of visited locations with a cursor
pub struct MemoryHistory {
    entries: Mutex<Entries>,
    listeners: Arc<ListenerTable<Location>>,
}

impl MemoryHistory {
    /// History positioned at `url`
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            entries: Mutex::new(Entries {
                stack: vec![Location::parse(url)],
                index: 0,
            }),
            listeners: ListenerTable::new(),
        }
    }

    /// Current location
    #[must_use]
    pub fn location(&self) -> Location {
        let entries = self.entries.lock();
        entries.stack[entries.index].clone()
    }

    /// Navigate to `url`, dropping any forward entries
    pub fn push(&self, url: &str) {
        self.push_location(Location::parse(url));
    }

    /// Navigate to `location`, dropping any forward entries
    pub fn push_location(&self, location: Location) {
        {
            let mut entries = self.entries.lock();
            let keep = entries.index + 1;
            entries.stack.truncate(keep);
            entries.stack.push(location.clone());
            entries.index = keep;
        }
        self.listeners.notify(&location);
    }

    /// Replace the current entry with `url`
    pub fn replace(&self, url: &str) {
        self.replace_location(Location::parse(url));
    }

    /// Replace the current entry with `location`
    pub fn replace_location(&self, location: Location) {
        {
            let mut entries = self.entries.lock();
            let index = entries.index;
            entries.stack[index] = location.clone();
        }
        self.listeners.notify(&location);
    }

    /// Step back; returns `false` at the oldest entry
    pub fn back(&self) -> bool {
        self.step(-1)
    }

    /// Step forward; returns `false` at the newest entry
    pub fn forward(&self) -> bool {
        self.step(1)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().stack.len()
    }

    /// Always `false`; a history holds at least its initial entry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().stack.is_empty()
    }

    /// Listen for location changes
    pub fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Location) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    fn step(&self, delta: isize) -> bool {
        let location = {
            let mut entries = self.entries.lock();
            let Some(next) = entries.index.checked_add_signed(delta) else {
                return false;
            };
            if next >= entries.stack.len() {
                return false;
            }
            entries.index = next;
            entries.stack[next].clone()
        };
        self.listeners.notify(&location);
        true
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("MemoryHistory")
            .field("location", &entries.stack[entries.index].to_url_string())
            .field("len", &entries.stack.len())
            .finish()
    }
}
