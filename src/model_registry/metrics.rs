//! Registry-wide metrics, exposed for observability.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryMetrics {
    pub total_models: usize,
    pub total_memory_bytes: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
}

impl RegistryMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn increment_hits(&mut self) {
        self.cache_hits += 1;
    }

    pub fn increment_misses(&mut self) {
        self.cache_misses += 1;
    }

    pub fn increment_evictions(&mut self) {
        self.evictions += 1;
    }

    pub fn update_model_stats(&mut self, total_models: usize, total_memory_bytes: usize) {
        self.total_models = total_models;
        self.total_memory_bytes = total_memory_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_with_no_accesses() {
        assert_eq!(RegistryMetrics::default().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_reflects_hits_over_total() {
        let mut metrics = RegistryMetrics::default();
        metrics.increment_hits();
        metrics.increment_hits();
        metrics.increment_hits();
        metrics.increment_misses();
        assert_eq!(metrics.hit_rate(), 0.75);
    }
}
