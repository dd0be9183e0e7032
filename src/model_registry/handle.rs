//! Reference-counted handle to a loaded model.

use super::InferenceModel;
use dashmap::DashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A reference-counted handle to a model held by the registry.
///
/// Cloning a handle bumps the underlying `Arc`'s strong count; dropping the
/// last outstanding handle (strong count falls back to the registry's own
/// reference) makes the model eligible for eviction again.
pub struct ModelHandle<T: InferenceModel + ?Sized = dyn InferenceModel> {
    inner: Arc<T>,
    model_id: String,
    registry_models: Arc<DashMap<String, Arc<dyn InferenceModel>>>,
    _phantom: PhantomData<T>,
}

impl ModelHandle<dyn InferenceModel> {
    pub fn new(
        inner: Arc<dyn InferenceModel>,
        model_id: String,
        registry_models: Arc<DashMap<String, Arc<dyn InferenceModel>>>,
    ) -> Self {
        Self {
            inner,
            model_id,
            registry_models,
            _phantom: PhantomData,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model(&self) -> &Arc<dyn InferenceModel> {
        &self.inner
    }
}

impl Clone for ModelHandle<dyn InferenceModel> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            model_id: self.model_id.clone(),
            registry_models: Arc::clone(&self.registry_models),
            _phantom: PhantomData,
        }
    }
}

impl Drop for ModelHandle<dyn InferenceModel> {
    fn drop(&mut self) {
        // +1 for the handle being dropped itself, +1 for the registry's own
        // entry in `registry_models` — strong_count of 2 means this was the
        // last outstanding caller-held handle.
        if Arc::strong_count(&self.inner) <= 2 {
            tracing::debug!(model_id = %self.model_id, "last handle to model dropped, eligible for eviction");
        }
    }
}

impl std::ops::Deref for ModelHandle<dyn InferenceModel> {
    type Target = dyn InferenceModel;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}
