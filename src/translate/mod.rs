// Thai <-> English translation with a lazily loaded, single-slot engine cache
//
// - cache: holds the one resident engine and swaps it when the direction changes
// - pipeline: direction-specific pre/post-processing around the engine call

pub mod cache;
pub mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

pub use cache::{LoadedEngine, ModelCache};
use crate::config::{Config, ReloadPolicy};
use crate::engine::{EngineLoader, FairseqLoader};
use crate::error::Result;
use crate::language::LanguagePair;
use crate::store::{ArtifactStore, CorpusStore};
use crate::tokenize::{MosesTokenizer, Tokenizer};

/// Entry point: installs bundles on demand and routes text through the right engine
pub struct Translator {
    store: Arc<dyn ArtifactStore>,
    cache: ModelCache,
    en_tokenizer: Arc<dyn Tokenizer>,
}

impl Translator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        loader: Arc<dyn EngineLoader>,
        policy: ReloadPolicy,
    ) -> Self {
        Self {
            store,
            cache: ModelCache::new(loader, policy),
            en_tokenizer: Arc::new(MosesTokenizer::new()),
        }
    }

    /// Translator backed by the corpus store, HTTP downloads and fairseq
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = CorpusStore::from_config(&config.storage)?;
        let loader = FairseqLoader::new(config.engine.clone());
        Ok(Self::new(Arc::new(store), Arc::new(loader), config.cache.reload))
    }

    /// Replace the English word tokenizer used before en->th translation
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.en_tokenizer = tokenizer;
        self
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Translate `text` from `source` to `target` ("th" or "en")
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let pair = LanguagePair::from_codes(source, target)?;
        self.translate_pair(text, pair).await
    }

    pub async fn translate_pair(&self, text: &str, pair: LanguagePair) -> Result<String> {
        let bundle_root = self.store.ensure_installed(pair.bundle()).await?;
        let loaded = self.cache.acquire(pair, &bundle_root).await?;

        let input = pipeline::prepare(pair, text, self.en_tokenizer.as_ref());
        debug!("Translating {} input: {}", pair, input);

        let hypothesis = loaded
            .engine
            .translate(&input, &pipeline::decode_options(pair))
            .await?;

        Ok(pipeline::finish(pair, hypothesis))
    }

    /// Install every supported bundle without loading any engine
    pub async fn download_model_all(&self) -> Result<Vec<PathBuf>> {
        let mut installed = Vec::with_capacity(LanguagePair::all().len());
        for pair in LanguagePair::all() {
            let path = self.store.ensure_installed(pair.bundle()).await?;
            info!("Bundle {} ready at {}", pair.bundle().name, path.display());
            installed.push(path);
        }
        Ok(installed)
    }
}
