//! Per-node session state: a bounded key/value store with TTL and capacity
//! eviction, attached to a node via the session ID travelling on `RuntimeData`.

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct StateManagerConfig {
    pub default_ttl: Duration,
    pub max_sessions: usize,
    pub sweep_interval: Duration,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 60 * 60),
            max_sessions: 10_000,
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl StateManagerConfig {
    /// Reads `STATE_DEFAULT_TTL_MS` / `STATE_MAX_SESSIONS`, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ttl_ms) = std::env::var("STATE_DEFAULT_TTL_MS") {
            if let Ok(ms) = ttl_ms.parse::<u64>() {
                config.default_ttl = Duration::from_millis(ms);
            }
        }
        if let Ok(max_sessions) = std::env::var("STATE_MAX_SESSIONS") {
            if let Ok(n) = max_sessions.parse::<usize>() {
                config.max_sessions = n;
            }
        }

        config
    }
}

struct Session {
    values: HashMap<String, JsonValue>,
    created_at: Instant,
    last_accessed: Instant,
}

impl Session {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            values: HashMap::new(),
            created_at: now,
            last_accessed: now,
        }
    }
}

/// Per-node singleton session store. One `StateManager` belongs to exactly
/// one `NodeHost`; sessions are never shared across nodes.
pub struct StateManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: StateManagerConfig,
}

impl StateManager {
    pub fn new(config: StateManagerConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Returns a handle scoped to `session_id`, creating the session on first
    /// access. If creating it would exceed `max_sessions`, evicts the
    /// least-recently-accessed session first.
    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        {
            let mut sessions = self.sessions.write();
            if !sessions.contains_key(session_id) {
                if sessions.len() >= self.config.max_sessions {
                    if let Some(victim) = sessions
                        .iter()
                        .min_by_key(|(_, s)| s.last_accessed)
                        .map(|(id, _)| id.clone())
                    {
                        sessions.remove(&victim);
                        tracing::debug!(session_id = %victim, "evicted LRU session at capacity");
                    }
                }
                sessions.insert(session_id.to_string(), Session::new());
            }
            if let Some(session) = sessions.get_mut(session_id) {
                session.last_accessed = Instant::now();
            }
        }

        SessionHandle {
            session_id: session_id.to_string(),
            sessions: Arc::clone(&self.sessions),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Removes sessions whose `last_accessed` is older than `default_ttl`.
    /// Intended to run on a periodic tick (`sweep_interval`).
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.default_ttl;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| now.duration_since(session.last_accessed) <= ttl);
        before - sessions.len()
    }

    pub fn clear(&self) {
        self.sessions.write().clear();
    }

    pub fn sweep_interval(&self) -> Duration {
        self.config.sweep_interval
    }

    /// Spawns a background task that calls `sweep_expired` every
    /// `sweep_interval` until `stop_rx` reports a stop request. The task
    /// holds its own `Arc` clone, so the caller doesn't need to join it —
    /// only keep `self` alive for as long as sweeping should continue.
    pub fn spawn_sweep_task(self: &Arc<Self>, mut stop_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sweep_interval);
            ticker.tick().await; // first tick fires immediately, skip it
            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let removed = manager.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "periodic session sweep");
                        }
                    }
                }
            }
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(StateManagerConfig::default())
    }
}

/// A handle scoped to one session, handed to a node via `NodeContext`. Cheap
/// to clone; every clone reads/writes the same underlying session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.sessions
            .read()
            .get(&self.session_id)
            .and_then(|s| s.values.get(key))
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: JsonValue) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&self.session_id) {
            session.values.insert(key.into(), value);
            session.last_accessed = Instant::now();
        }
    }

    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(Option<JsonValue>) -> JsonValue,
    {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&self.session_id) {
            let current = session.values.get(key).cloned();
            session.values.insert(key.to_string(), f(current));
            session.last_accessed = Instant::now();
        }
    }

    pub fn clear(&self) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&self.session_id) {
            session.values.clear();
        }
    }

    pub fn created_at(&self) -> Option<Instant> {
        self.sessions.read().get(&self.session_id).map(|s| s.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent_per_session() {
        let manager = StateManager::default();
        let handle_a = manager.get_or_create("session-1");
        handle_a.set("count", serde_json::json!(1));

        let handle_b = manager.get_or_create("session-1");
        assert_eq!(handle_b.get("count"), Some(serde_json::json!(1)));
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn capacity_eviction_picks_lru_victim() {
        let manager = StateManager::new(StateManagerConfig {
            default_ttl: Duration::from_secs(60),
            max_sessions: 2,
            sweep_interval: Duration::from_secs(60),
        });

        manager.get_or_create("a");
        std::thread::sleep(Duration::from_millis(2));
        manager.get_or_create("b");
        std::thread::sleep(Duration::from_millis(2));
        // touching "a" keeps it more recent than "b"
        manager.get_or_create("a");
        std::thread::sleep(Duration::from_millis(2));

        manager.get_or_create("c");

        assert_eq!(manager.session_count(), 2);
        assert!(manager.get_or_create("a").get("never-set").is_none());
    }

    #[test]
    fn update_applies_to_missing_and_present_keys() {
        let manager = StateManager::default();
        let handle = manager.get_or_create("s");
        handle.update("count", |current| {
            let n = current.and_then(|v| v.as_i64()).unwrap_or(0);
            serde_json::json!(n + 1)
        });
        handle.update("count", |current| {
            let n = current.and_then(|v| v.as_i64()).unwrap_or(0);
            serde_json::json!(n + 1)
        });
        assert_eq!(handle.get("count"), Some(serde_json::json!(2)));
    }

    #[test]
    fn sweep_expired_removes_stale_sessions_only() {
        let manager = StateManager::new(StateManagerConfig {
            default_ttl: Duration::from_millis(5),
            max_sessions: 100,
            sweep_interval: Duration::from_secs(60),
        });
        manager.get_or_create("stale");
        std::thread::sleep(Duration::from_millis(20));
        manager.get_or_create("fresh");

        let removed = manager.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn spawn_sweep_task_removes_expired_sessions_on_its_own() {
        let manager = Arc::new(StateManager::new(StateManagerConfig {
            default_ttl: Duration::from_millis(5),
            max_sessions: 100,
            sweep_interval: Duration::from_millis(10),
        }));
        manager.get_or_create("stale");

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = manager.spawn_sweep_task(stop_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.session_count(), 0);

        let _ = stop_tx.send(true);
        task.await.unwrap();
    }
}
