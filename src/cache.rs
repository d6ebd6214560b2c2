use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Entries removed per write-lock acquisition during a sweep
const SWEEP_BATCH: usize = 128;

/// Identity of a cached aggregation result
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AllHubs,
    Hub(String),
    Spokes(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllHubs => f.write_str("hubs:list"),
            CacheKey::Hub(name) => write!(f, "hub:{name}"),
            CacheKey::Spokes(name) => write!(f, "hub:{name}:clusters"),
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value store whose entries expire a fixed time after they were written.
///
/// Expired entries are never returned, swept or not.
pub struct ResultCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    pub async fn set(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    pub async fn delete(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Stored entries, expired ones included until swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries, yielding between batches so readers are not starved.
    ///
    /// Returns how many entries were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect()
        };

        let mut removed = 0;
        for batch in expired.chunks(SWEEP_BATCH) {
            {
                let mut entries = self.entries.write().await;
                for key in batch {
                    // a fresh write may have replaced the entry since the scan
                    if entries.get(key).is_some_and(|e| e.expires_at <= now) {
                        entries.remove(key);
                        removed += 1;
                    }
                }
            }
            tokio::task::yield_now().await;
        }
        removed
    }

    /// Sweep every `interval` until `shutdown` is cancelled
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep().await;
                        if removed > 0 {
                            debug!(removed, "swept expired cache entries");
                        }
                    }
                }
            }
            info!("cache sweeper stopped");
        })
    }
}

impl<K, V> Default for ResultCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
