//! Per-container write serialization.
//!
//! Container writes are read-merge-rewrite; two concurrent writers targeting
//! the same container would lose one writer's entry. Writers for different
//! containers never block each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Registry of one mutex per container path.
#[derive(Debug, Default)]
pub struct ContainerLocks {
    slots: Slots,
}

impl ContainerLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by every writer that does not bring its own.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ContainerLocks>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// Relative paths are keyed by their absolute form, so `data/x.zip` and
    /// `./data/x.zip` share one lock. The slot is released even if `f` panics.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let key = lock_key(path);
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let release = SlotRelease {
            slots: &self.slots,
            key,
            slot,
        };
        let _guard = release.slot.lock();
        f()
    }

    /// Number of containers currently tracked.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// True when no container is locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Slots = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// Drops the registry slot once the last user is done with it.
struct SlotRelease<'a> {
    slots: &'a Slots,
    key: PathBuf,
    slot: Arc<Mutex<()>>,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        // Map + this handle: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_slot_released_after_use() {
        let locks = ContainerLocks::new();
        let value = locks.with_lock(Path::new("/a.zip"), || 42);
        assert_eq!(value, 42);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_relative_spellings_share_a_key() {
        assert_eq!(lock_key(Path::new("./data/c.zip")), lock_key(Path::new("data/c.zip")));
        assert!(lock_key(Path::new("data/c.zip")).is_absolute());
    }

    #[test]
    fn test_slot_released_when_closure_panics() {
        let locks = ContainerLocks::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            locks.with_lock(Path::new("/a.zip"), || panic!("write failed"))
        }));
        assert!(result.is_err());
        assert!(locks.is_empty());
        assert_eq!(locks.with_lock(Path::new("/a.zip"), || 7), 7);
    }

    #[test]
    fn test_same_path_is_mutually_exclusive() {
        let locks = Arc::new(ContainerLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(Path::new("/shared.zip"), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
