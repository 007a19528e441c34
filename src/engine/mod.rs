// Translation engine binding
//
// The cache only sees these two traits:
// - EngineLoader: builds an engine from an installed bundle and keeps its weights resident
// - Engine: translates one input string with the already loaded model

pub mod fairseq;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::language::Language;

pub use fairseq::{FairseqEngine, FairseqLoader};

/// Subword segmentation applied inside the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubwordConfig {
    Sentencepiece { model: PathBuf },
}

/// Everything needed to construct an engine for one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    pub checkpoint: PathBuf,
    pub vocab_dir: PathBuf,
    pub source_lang: Language,
    pub target_lang: Language,
    pub subword: Option<SubwordConfig>,
    /// Decoding fixed for the lifetime of the engine
    pub decode: DecodeOptions,
}

/// Per-call decoding parameters; `None` keeps the engine default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub beam: Option<usize>,
}

impl DecodeOptions {
    pub fn with_beam(beam: usize) -> Self {
        Self { beam: Some(beam) }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Engine: Send + Sync {
    /// Translate a single pre-processed input.
    ///
    /// `options` must match the `decode` the engine was loaded with.
    async fn translate(&self, input: &str, options: &DecodeOptions) -> Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Construct an engine from the checkpoint and vocabulary in `spec`
    async fn load(&self, spec: &EngineSpec) -> Result<Box<dyn Engine>>;
}
