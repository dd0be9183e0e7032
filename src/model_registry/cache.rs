//! Eviction bookkeeping for the model registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Model eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Least recently used.
    Lru,
    /// Least frequently used.
    Lfu,
    /// Time-based only.
    Ttl,
    /// No automatic eviction; only explicit `release()`-driven sweeps.
    Manual,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

/// Metadata for a cached model, independent of the model instance itself.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub model_id: String,
    pub last_accessed: Instant,
    pub loaded_at: Instant,
    pub access_count: u64,
}

/// Tracks access recency/frequency per model key and proposes eviction candidates.
/// Does not hold the model instances themselves — the registry owns those.
pub struct CacheManager {
    policy: EvictionPolicy,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl CacheManager {
    pub fn new(policy: EvictionPolicy, ttl: Duration) -> Self {
        Self {
            policy,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn record_access(&mut self, model_id: &str) {
        if let Some(entry) = self.entries.get_mut(model_id) {
            entry.last_accessed = Instant::now();
            entry.access_count += 1;
        } else {
            let now = Instant::now();
            self.entries.insert(
                model_id.to_string(),
                CacheEntry {
                    model_id: model_id.to_string(),
                    last_accessed: now,
                    loaded_at: now,
                    access_count: 1,
                },
            );
        }
    }

    /// Candidates eligible for eviction under the configured policy, given each
    /// model's current external reference count. A model with more than one
    /// strong reference (the registry's own, plus at least one live handle) is
    /// never a candidate regardless of policy.
    pub fn get_eviction_candidates(&self, current_refs: &HashMap<String, usize>) -> Vec<String> {
        let now = Instant::now();
        let mut candidates = Vec::new();

        for (model_id, entry) in &self.entries {
            let ref_count = current_refs.get(model_id).copied().unwrap_or(0);
            if ref_count > 1 {
                continue;
            }

            match self.policy {
                EvictionPolicy::Manual => {}
                EvictionPolicy::Ttl | EvictionPolicy::Lru | EvictionPolicy::Lfu => {
                    let age = now.duration_since(entry.last_accessed);
                    if age > self.ttl {
                        candidates.push(model_id.clone());
                    }
                }
            }
        }

        match self.policy {
            EvictionPolicy::Lru => {
                candidates.sort_by_key(|id| self.entries.get(id).map(|e| e.last_accessed));
            }
            EvictionPolicy::Lfu => {
                candidates.sort_by_key(|id| self.entries.get(id).map(|e| e.access_count));
            }
            _ => {}
        }

        candidates
    }

    pub fn remove_entry(&mut self, model_id: &str) {
        self.entries.remove(model_id);
    }

    pub fn entries(&self) -> &HashMap<String, CacheEntry> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_orders_oldest_first() {
        let mut mgr = CacheManager::new(EvictionPolicy::Lru, Duration::from_millis(0));
        mgr.record_access("a");
        std::thread::sleep(Duration::from_millis(5));
        mgr.record_access("b");

        let refs = HashMap::from([("a".to_string(), 0), ("b".to_string(), 0)]);
        let candidates = mgr.get_eviction_candidates(&refs);
        assert_eq!(candidates, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn models_still_referenced_are_never_candidates() {
        let mut mgr = CacheManager::new(EvictionPolicy::Ttl, Duration::from_millis(0));
        mgr.record_access("a");
        let refs = HashMap::from([("a".to_string(), 2)]);
        assert!(mgr.get_eviction_candidates(&refs).is_empty());
    }

    #[test]
    fn manual_policy_never_proposes_candidates() {
        let mut mgr = CacheManager::new(EvictionPolicy::Manual, Duration::from_millis(0));
        mgr.record_access("a");
        let refs = HashMap::from([("a".to_string(), 0)]);
        assert!(mgr.get_eviction_candidates(&refs).is_empty());
    }
}
