//! Process-local registry for expensive-to-load model instances.
//!
//! Makes a model loadable once per process and shared across every node that
//! asks for the same key, with reference-counted handles and a configurable
//! eviction policy.

pub mod cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod metrics;

pub use cache::{CacheManager, EvictionPolicy};
pub use config::RegistryConfig;
pub use error::ModelRegistryError;
pub use handle::ModelHandle;
pub use metrics::RegistryMetrics;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub type Result<T> = std::result::Result<T, ModelRegistryError>;

/// Target device a model instance is resident on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeviceType {
    Cpu,
    Cuda(u32),
    Metal(u32),
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Cuda(idx) => write!(f, "cuda:{idx}"),
            DeviceType::Metal(idx) => write!(f, "metal:{idx}"),
        }
    }
}

/// A loaded model instance, shareable across nodes in the same process.
///
/// `infer` is deliberately byte-oriented: the registry has no opinion on
/// tensor shapes or dtypes, those belong to the node that owns the model and
/// knows how to encode/decode its particular inputs and outputs.
#[async_trait]
pub trait InferenceModel: Send + Sync + 'static {
    fn model_id(&self) -> &str;
    fn device(&self) -> DeviceType;
    /// Best-effort resident memory estimate in bytes, used by eviction accounting.
    fn memory_usage(&self) -> usize;
    async fn infer(&self, input: &[u8]) -> std::result::Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub device: DeviceType,
    pub memory_bytes: usize,
    pub reference_count: usize,
}

struct LoadingGuard<'a> {
    registry: &'a ModelRegistry,
    key: String,
    completed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.registry.loading.lock().remove(&self.key);
        }
    }
}

/// Process-local singleton registry. Cheap to clone (wraps `Arc`s internally).
pub struct ModelRegistry {
    models: Arc<DashMap<String, Arc<dyn InferenceModel>>>,
    loading: Arc<Mutex<HashSet<String>>>,
    cache: Arc<Mutex<CacheManager>>,
    config: RegistryConfig,
    metrics: Arc<Mutex<RegistryMetrics>>,
}

impl ModelRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let cache = CacheManager::new(config.eviction_policy, config.ttl);
        Self {
            models: Arc::new(DashMap::new()),
            loading: Arc::new(Mutex::new(HashSet::new())),
            cache: Arc::new(Mutex::new(cache)),
            config,
            metrics: Arc::new(Mutex::new(RegistryMetrics::default())),
        }
    }

    /// Get an existing model by key, or load it with `loader` if absent.
    /// `loader` runs exactly once per key even under concurrent callers: the
    /// first caller marks the key "loading", and concurrent callers poll
    /// until it either appears in `models` (success) or disappears from
    /// `loading` without appearing (failure — next caller retries).
    pub async fn get_or_load<L, Fut>(&self, key: &str, loader: L) -> Result<ModelHandle<dyn InferenceModel>>
    where
        L: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<Arc<dyn InferenceModel>, String>>,
    {
        if let Some(existing) = self.models.get(key) {
            self.cache.lock().record_access(key);
            self.metrics.lock().increment_hits();
            return Ok(ModelHandle::new(
                Arc::clone(existing.value()),
                key.to_string(),
                Arc::clone(&self.models),
            ));
        }

        let is_first = {
            let mut loading = self.loading.lock();
            if loading.contains(key) {
                false
            } else {
                loading.insert(key.to_string());
                true
            }
        };

        if !is_first {
            loop {
                if let Some(existing) = self.models.get(key) {
                    self.cache.lock().record_access(key);
                    self.metrics.lock().increment_hits();
                    return Ok(ModelHandle::new(
                        Arc::clone(existing.value()),
                        key.to_string(),
                        Arc::clone(&self.models),
                    ));
                }
                if !self.loading.lock().contains(key) {
                    return Err(ModelRegistryError::LoadFailed(
                        key.to_string(),
                        "concurrent load attempt failed".to_string(),
                    ));
                }
                sleep(Duration::from_millis(5)).await;
            }
        }

        let mut guard = LoadingGuard {
            registry: self,
            key: key.to_string(),
            completed: false,
        };

        self.metrics.lock().increment_misses();

        if let Some(max_models) = self.config.max_models {
            if self.models.len() >= max_models {
                self.evict_expired().await;
                if self.models.len() >= max_models {
                    return Err(ModelRegistryError::RegistryFull);
                }
            }
        }

        let model = loader()
            .await
            .map_err(|e| ModelRegistryError::LoadFailed(key.to_string(), e))?;

        self.models.insert(key.to_string(), Arc::clone(&model));
        self.cache.lock().record_access(key);
        guard.completed = true;
        self.loading.lock().remove(key);

        let (total_models, total_memory) = self.compute_totals();
        self.metrics.lock().update_model_stats(total_models, total_memory);

        Ok(ModelHandle::new(model, key.to_string(), Arc::clone(&self.models)))
    }

    /// Drop the registry's own strong reference to `key`. The underlying
    /// model stays alive as long as any `ModelHandle` still holds it.
    pub fn release(&self, key: &str) {
        self.models.remove(key);
        self.cache.lock().remove_entry(key);
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.models
            .iter()
            .map(|entry| ModelInfo {
                model_id: entry.key().clone(),
                device: entry.value().device(),
                memory_bytes: entry.value().memory_usage(),
                reference_count: Arc::strong_count(entry.value()).saturating_sub(1),
            })
            .collect()
    }

    pub fn metrics(&self) -> RegistryMetrics {
        self.metrics.lock().clone()
    }

    /// Run an eviction sweep. Returns `(evicted_count, freed_bytes)`.
    /// A model is only a true candidate once its reference count, excluding
    /// the registry's own entry, is zero — a live `ModelHandle` always wins.
    pub async fn evict_expired(&self) -> (usize, usize) {
        let current_refs: std::collections::HashMap<String, usize> = self
            .models
            .iter()
            .map(|entry| (entry.key().clone(), Arc::strong_count(entry.value())))
            .collect();

        let candidates = self.cache.lock().get_eviction_candidates(&current_refs);

        let mut evicted = 0;
        let mut freed_bytes = 0;

        for key in candidates {
            let ref_count = current_refs.get(&key).copied().unwrap_or(0);
            if ref_count > 1 {
                continue;
            }
            if let Some((_, model)) = self.models.remove(&key) {
                freed_bytes += model.memory_usage();
                evicted += 1;
                self.cache.lock().remove_entry(&key);
                tracing::debug!(model_id = %key, "evicted model from registry");
            }
        }

        if evicted > 0 {
            let mut metrics = self.metrics.lock();
            for _ in 0..evicted {
                metrics.increment_evictions();
            }
            let (total_models, total_memory) = self.compute_totals();
            metrics.update_model_stats(total_models, total_memory);
        }

        (evicted, freed_bytes)
    }

    pub fn clear(&self) {
        self.models.clear();
        self.loading.lock().clear();
    }

    fn compute_totals(&self) -> (usize, usize) {
        let total_models = self.models.len();
        let total_memory = self.models.iter().map(|e| e.value().memory_usage()).sum();
        (total_models, total_memory)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
