//! Debounced background saves.
//!
//! Each schedule for a key supersedes the previous one; only the most recent
//! task runs, once the delay has passed without another schedule.

use log::debug;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    /// Generation of the live task per key
    pending: Arc<Mutex<HashMap<String, u64>>>,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` after the delay unless `key` is scheduled or cancelled again
    /// first. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: &str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().insert(key.to_string(), generation);

        let pending = self.pending.clone();
        let delay = self.delay;
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.get(&key) == Some(&generation) {
                    pending.remove(&key);
                    true
                } else {
                    false
                }
            };
            if current {
                task.await;
            } else {
                debug!("[save] Superseded save for {} (generation {})", key, generation);
            }
        })
    }

    /// Drop the pending task for `key`. Returns true if one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Keys with a task waiting to fire.
    pub fn pending_keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
