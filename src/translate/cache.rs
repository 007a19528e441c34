use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::ReloadPolicy;
use crate::engine::{Engine, EngineLoader, EngineSpec};
use crate::error::{Result, ThaiMtError};
use crate::language::LanguagePair;
use super::pipeline;

/// The engine currently held by the cache, tagged with the pair it was built for
pub struct LoadedEngine {
    pub pair: LanguagePair,
    pub engine: Box<dyn Engine>,
}

/// Single-slot engine cache.
///
/// Holds at most one engine. Requesting the cached pair reuses it; requesting
/// any other pair replaces it according to the [`ReloadPolicy`].
pub struct ModelCache {
    loader: Arc<dyn EngineLoader>,
    policy: ReloadPolicy,
    slot: Mutex<Option<LoadedEngine>>,
    loads: AtomicUsize,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn EngineLoader>, policy: ReloadPolicy) -> Self {
        Self {
            loader,
            policy,
            slot: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Lock the slot holding an engine for `pair`, loading it from `bundle_root` if needed.
    ///
    /// The slot stays locked for as long as the returned guard lives.
    pub async fn acquire(
        &self,
        pair: LanguagePair,
        bundle_root: &Path,
    ) -> Result<MappedMutexGuard<'_, LoadedEngine>> {
        let mut slot = self.slot.lock().await;

        let hit = slot.as_ref().is_some_and(|loaded| loaded.pair == pair);
        if hit {
            debug!("Reusing cached engine for {}", pair);
        } else {
            let spec = EngineSpec {
                decode: pipeline::decode_options(pair),
                ..pair.bundle().engine_spec(bundle_root)
            };

            match self.policy {
                ReloadPolicy::ReleaseFirst => {
                    if let Some(previous) = slot.take() {
                        info!("Releasing engine for {}", previous.pair);
                    }
                    let engine = self.loader.load(&spec).await?;
                    *slot = Some(LoadedEngine { pair, engine });
                }
                ReloadPolicy::SwapAfterLoad => {
                    let engine = self.loader.load(&spec).await.inspect_err(|e| {
                        if let Some(current) = slot.as_ref() {
                            warn!("Load for {} failed, keeping engine for {}: {}", pair, current.pair, e);
                        }
                    })?;
                    if let Some(previous) = slot.replace(LoadedEngine { pair, engine }) {
                        info!("Released engine for {}", previous.pair);
                    }
                }
            }

            self.loads.fetch_add(1, Ordering::Relaxed);
            info!("Engine for {} loaded", pair);
        }

        MutexGuard::try_map(slot, |slot| slot.as_mut())
            .map_err(|_| ThaiMtError::EngineLoad(format!("No engine available for {}", pair)))
    }

    /// Pair of the engine currently cached, if any
    pub async fn current_pair(&self) -> Option<LanguagePair> {
        self.slot.lock().await.as_ref().map(|loaded| loaded.pair)
    }

    /// Number of engines constructed so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}
