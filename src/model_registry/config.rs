//! Configuration for the model registry.

use super::cache::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub ttl: Duration,
    pub max_memory_bytes: Option<usize>,
    pub eviction_policy: EvictionPolicy,
    pub enable_metrics: bool,
    pub max_models: Option<usize>,
    pub auto_cleanup: bool,
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_memory_bytes: None,
            eviction_policy: EvictionPolicy::Lru,
            enable_metrics: true,
            max_models: None,
            auto_cleanup: true,
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_max_models(mut self, count: usize) -> Self {
        self.max_models = Some(count);
        self
    }

    /// Read from `MODEL_REGISTRY_EVICTION_POLICY` / `MODEL_REGISTRY_TTL_MS` /
    /// `MODEL_REGISTRY_MAX_BYTES`, falling back to defaults for anything unset
    /// or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(policy) = std::env::var("MODEL_REGISTRY_EVICTION_POLICY") {
            config.eviction_policy = match policy.to_ascii_lowercase().as_str() {
                "lru" => EvictionPolicy::Lru,
                "lfu" => EvictionPolicy::Lfu,
                "ttl" => EvictionPolicy::Ttl,
                "manual" => EvictionPolicy::Manual,
                other => {
                    tracing::warn!(value = other, "unrecognized MODEL_REGISTRY_EVICTION_POLICY, keeping default");
                    config.eviction_policy
                }
            };
        }

        if let Ok(ttl_ms) = std::env::var("MODEL_REGISTRY_TTL_MS") {
            if let Ok(ms) = ttl_ms.parse::<u64>() {
                config.ttl = Duration::from_millis(ms);
            }
        }

        if let Ok(max_bytes) = std::env::var("MODEL_REGISTRY_MAX_BYTES") {
            if let Ok(bytes) = max_bytes.parse::<usize>() {
                config.max_memory_bytes = Some(bytes);
            }
        }

        config
    }
}
