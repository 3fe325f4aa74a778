// Short-lived interactive sessions keyed by message id, each with an inactivity timer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::task::AbortHandle;
use tracing::debug;

/// Called with the session state once its timer runs out
pub type ExpiryHandler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct Entry<T> {
    state: T,
    timer: AbortHandle,
    generation: u64,
}

pub struct SessionStore<T> {
    sessions: Arc<DashMap<u64, Entry<T>>>,
    timeout: Duration,
    on_expire: ExpiryHandler<T>,
    generation: AtomicU64,
}

impl<T: Send + Sync + 'static> SessionStore<T> {
    pub fn new(timeout: Duration, on_expire: ExpiryHandler<T>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            timeout,
            on_expire,
            generation: AtomicU64::new(0),
        }
    }

    fn arm(&self, key: u64, generation: u64) -> AbortHandle {
        let sessions = Arc::clone(&self.sessions);
        let on_expire = Arc::clone(&self.on_expire);
        let timeout = self.timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // A touch that raced this wakeup owns the entry now
            if let Some((_, entry)) = sessions.remove_if(&key, |_, e| e.generation == generation) {
                debug!("Session {} expired", key);
                on_expire(entry.state).await;
            }
        })
        .abort_handle()
    }

    /// Starts a session, replacing any previous one under `key`
    pub fn insert(&self, key: u64, state: T) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timer = self.arm(key, generation);
        if let Some(old) = self.sessions.insert(key, Entry { state, timer, generation }) {
            old.timer.abort();
        }
    }

    /// Mutates a live session and restarts its timer
    pub fn update<R>(&self, key: u64, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut entry = self.sessions.get_mut(&key)?;
        let result = f(&mut entry.state);

        entry.timer.abort();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        entry.generation = generation;
        entry.timer = self.arm(key, generation);
        Some(result)
    }

    pub fn get(&self, key: u64) -> Option<T>
    where
        T: Clone,
    {
        self.sessions.get(&key).map(|e| e.state.clone())
    }

    /// Ends a session without running the expiry handler
    pub fn remove(&self, key: u64) -> Option<T> {
        self.sessions.remove(&key).map(|(_, entry)| {
            entry.timer.abort();
            entry.state
        })
    }
}
