//! Keyed async mutual exclusion
//!
//! Serializes logically-conflicting operations within one process: two
//! concurrent searches for the same normalized query, two payment
//! submissions for the same idempotency key. Contention is per key, so
//! unrelated keys never wait on each other.
//!
//! Waiters are served strictly FIFO, and every acquisition is bounded by
//! a timeout: a caller on a request-handling path needs a deterministic
//! upper bound on how long it can be suspended. Release hands the lock
//! directly to the queue head, so the key never observably passes
//! through a free state while waiters exist.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Default bound on lock acquisition
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lock acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The waiter's deadline elapsed before the lock was granted
    #[error("timed out after {timeout:?} waiting for lock on key '{key}'")]
    Timeout { key: String, timeout: Duration },
}

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct LockEntry {
    held: bool,
    waiters: VecDeque<Waiter>,
}

#[derive(Default)]
struct LockInner {
    entries: Mutex<HashMap<String, LockEntry>>,
    waiter_seq: AtomicU64,
}

/// Per-key async mutual exclusion with FIFO waiters
///
/// Cloning is cheap and clones share state. Entries are created lazily
/// on first contention and pruned once free and uncontended, so the map
/// only ever holds actively-used keys.
#[derive(Clone, Default)]
pub struct KeyedLock {
    inner: Arc<LockInner>,
}

impl KeyedLock {
    /// Create a new keyed lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key` with the default 30 s timeout
    pub async fn acquire(&self, key: &str) -> Result<KeyedLockGuard, LockError> {
        self.acquire_timeout(key, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Acquire the lock for `key`, waiting at most `timeout`
    ///
    /// Returns immediately when the key is uncontended. Otherwise the
    /// caller is enqueued FIFO and suspended until the lock is handed to
    /// it, or until the deadline elapses - in which case it is removed
    /// from the queue and fails with [`LockError::Timeout`], without
    /// affecting the holder or any other waiter.
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire_timeout(&self, key: &str, timeout: Duration) -> Result<KeyedLockGuard, LockError> {
        let (id, mut rx) = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.to_string()).or_default();
            if !entry.held {
                entry.held = true;
                return Ok(self.guard(key));
            }
            let (tx, rx) = oneshot::channel();
            let id = self.inner.waiter_seq.fetch_add(1, Ordering::Relaxed);
            entry.waiters.push_back(Waiter { id, grant: tx });
            (id, rx)
        };

        // timeout() polls the grant before the deadline, so a grant that
        // is already in flight wins over a timer firing in the same tick
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(())) => Ok(self.guard(key)),
            // the queue owns the sender, and entries are only dropped
            // when their queue is empty; a closed channel means this
            // waiter was already removed
            Ok(Err(_)) => Err(LockError::Timeout {
                key: key.to_string(),
                timeout,
            }),
            Err(_elapsed) => {
                let mut entries = self.inner.entries.lock();
                // the grant may have landed while the timer was firing;
                // the map mutex orders this check against release()
                match rx.try_recv() {
                    Ok(()) => {
                        drop(entries);
                        Ok(self.guard(key))
                    }
                    Err(_) => {
                        if let Some(entry) = entries.get_mut(key) {
                            entry.waiters.retain(|waiter| waiter.id != id);
                            if !entry.held && entry.waiters.is_empty() {
                                entries.remove(key);
                            }
                        }
                        log::debug!("lock acquisition for key '{}' timed out after {:?}", key, timeout);
                        Err(LockError::Timeout {
                            key: key.to_string(),
                            timeout,
                        })
                    }
                }
            }
        }
    }

    /// Whether the key is currently held (observability/test helper)
    pub fn is_held(&self, key: &str) -> bool {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.held)
            .unwrap_or(false)
    }

    /// Number of keys with live state (held or contended)
    pub fn entry_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    fn guard(&self, key: &str) -> KeyedLockGuard {
        KeyedLockGuard {
            lock: self.clone(),
            key: key.to_string(),
        }
    }

    /// Hand the lock to the next live waiter, or mark the key free.
    ///
    /// Waiters that gave up between enqueue and grant (timed out, or
    /// their acquire future was dropped) fail the grant send and are
    /// skipped; ownership transfers directly, so `held` stays true
    /// across a handoff.
    fn release(&self, key: &str) {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        while let Some(waiter) = entry.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }
        entries.remove(key);
    }
}

/// Holds the lock for one key; releases on drop
pub struct KeyedLockGuard {
    lock: KeyedLock,
    key: String,
}

impl KeyedLockGuard {
    /// The key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.key);
    }
}

impl std::fmt::Debug for KeyedLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLockGuard").field("key", &self.key).finish()
    }
}
