//! thaimt - Thai/English Neural Machine Translation
//!
//! Translates between Thai and English with pretrained fairseq checkpoints.
//! Model bundles are downloaded and unpacked on first use, and a single
//! engine is kept loaded and reused until a different direction is requested.

pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod logging;
pub mod store;
pub mod tokenize;
pub mod translate;

pub use error::{Result, ThaiMtError};
pub use language::{Language, LanguagePair};
pub use translate::Translator;
