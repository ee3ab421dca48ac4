use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of transaction ids that currently have a running watcher.
#[derive(Debug, Default)]
pub struct WatchSet {
    ids: Mutex<HashSet<String>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` as watched. Returns `false` if it already was.
    pub fn mark(&self, id: &str) -> bool {
        self.ids.lock().insert(id.to_owned())
    }

    pub fn is_watching(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn unmark(&self, id: &str) {
        self.ids.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks `id` and returns a guard that unmarks it on drop, or `None` if
    /// another watcher already holds it.
    pub fn try_guard(self: &Arc<Self>, id: &str) -> Option<WatchGuard> {
        self.mark(id).then(|| WatchGuard {
            set: Arc::clone(self),
            id: id.to_owned(),
        })
    }
}

/// Keeps a transaction id marked for as long as it lives.
#[derive(Debug)]
pub struct WatchGuard {
    set: Arc<WatchSet>,
    id: String,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.set.unmark(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let set = WatchSet::new();
        assert!(set.mark("a"));
        assert!(!set.mark("a"));
        assert!(set.is_watching("a"));
        assert_eq!(set.len(), 1);

        set.unmark("a");
        assert!(!set.is_watching("a"));
        assert!(set.is_empty());

        // unmarking an unknown id is a no-op
        set.unmark("b");
    }

    #[test]
    fn test_guard_unmarks_on_drop() {
        let set = Arc::new(WatchSet::new());
        let guard = set.try_guard("tx").unwrap();
        assert!(set.is_watching("tx"));
        assert!(set.try_guard("tx").is_none());

        drop(guard);
        assert!(!set.is_watching("tx"));
        assert!(set.try_guard("tx").is_some());
    }

    #[test]
    fn test_concurrent_guards_are_exclusive() {
        let set = Arc::new(WatchSet::new());
        let holders = Arc::new(Mutex::new(0usize));
        let max_seen = Arc::new(Mutex::new(0usize));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                let holders = Arc::clone(&holders);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(guard) = set.try_guard("same-id") {
                            let now = {
                                let mut h = holders.lock();
                                *h += 1;
                                *h
                            };
                            {
                                let mut m = max_seen.lock();
                                *m = (*m).max(now);
                            }
                            *holders.lock() -= 1;
                            drop(guard);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*max_seen.lock(), 1);
        assert!(set.is_empty());
    }
}
