//! Explicit state shared by calculation batches.
//!
//! The module registry and the result cache are passed around in a
//! [`CalcContext`] instead of living in process-wide globals.

use std::sync::Arc;

use dataflow_cache::ResultCache;
use dataflow_core::ModuleRegistry;

use crate::config::CalcConfig;

#[derive(Debug, Clone)]
pub struct CalcContext {
    pub registry: Arc<ModuleRegistry>,
    pub config: CalcConfig,
    cache: Option<ResultCache>,
}

impl CalcContext {
    /// A context without a cache.
    pub fn new(registry: Arc<ModuleRegistry>, config: CalcConfig) -> Self {
        CalcContext {
            registry,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Opens the configured cache (with its eviction sweep) when caching is
    /// enabled.
    pub async fn initialize(registry: Arc<ModuleRegistry>, config: CalcConfig) -> Self {
        let cache = if config.cache_enabled {
            Some(ResultCache::initialize(&config.cache_path, config.cache_max_age).await)
        } else {
            None
        };
        CalcContext {
            registry,
            config,
            cache,
        }
    }

    /// The cache to consult, or `None` when caching is off.
    pub fn cache(&self) -> Option<&ResultCache> {
        if self.config.cache_enabled {
            self.cache.as_ref()
        } else {
            None
        }
    }
}
