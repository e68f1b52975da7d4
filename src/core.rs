use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::ConfigResolver;
use crate::features::FeatureGate;
use crate::numbering::NumberingService;
use crate::storage::{
    ConfigRepository, FeatureRepository, NumberingRepository, TerminologyRepository,
};
use crate::terminology::TerminologyEngine;

/// The wired settings core: one storage implementation and one injected
/// cache store shared across the four engines. Construct once at process
/// start and pass around by reference; tests build isolated instances over
/// in-memory backends.
pub struct TenantCore {
    pub cache: Arc<CacheStore>,
    pub config: ConfigResolver,
    pub features: FeatureGate,
    pub terminology: TerminologyEngine,
    pub numbering: NumberingService,
}

impl TenantCore {
    pub fn new<S>(store: Arc<S>, cache: Arc<CacheStore>) -> Self
    where
        S: ConfigRepository
            + FeatureRepository
            + TerminologyRepository
            + NumberingRepository
            + 'static,
    {
        Self {
            config: ConfigResolver::new(store.clone(), cache.clone()),
            features: FeatureGate::new(store.clone(), cache.clone()),
            terminology: TerminologyEngine::new(store.clone(), cache.clone()),
            numbering: NumberingService::new(store, cache.clone()),
            cache,
        }
    }
}
