//! Supported languages, translation directions and the bundle catalogue

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::engine::{DecodeOptions, EngineSpec, SubwordConfig};
use crate::error::{Result, ThaiMtError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Th,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Th => "th",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ThaiMtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "th" => Ok(Self::Th),
            "en" => Ok(Self::En),
            other => Err(ThaiMtError::Config(format!("Unknown language code '{}'", other))),
        }
    }
}

/// A supported translation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguagePair {
    ThEn,
    EnTh,
}

impl LanguagePair {
    pub fn all() -> &'static [LanguagePair] {
        &[Self::ThEn, Self::EnTh]
    }

    pub fn new(source: Language, target: Language) -> Option<Self> {
        match (source, target) {
            (Language::Th, Language::En) => Some(Self::ThEn),
            (Language::En, Language::Th) => Some(Self::EnTh),
            _ => None,
        }
    }

    /// Resolve raw language codes into a direction.
    ///
    /// Unknown codes and same-language pairs are both reported as
    /// `UnsupportedDirection` so callers see a single failure kind.
    pub fn from_codes(source: &str, target: &str) -> Result<Self> {
        let unsupported = || ThaiMtError::UnsupportedDirection {
            from: source.to_string(),
            to: target.to_string(),
        };

        let src = source.parse::<Language>().map_err(|_| unsupported())?;
        let tgt = target.parse::<Language>().map_err(|_| unsupported())?;
        Self::new(src, tgt).ok_or_else(unsupported)
    }

    pub fn source(&self) -> Language {
        match self {
            Self::ThEn => Language::Th,
            Self::EnTh => Language::En,
        }
    }

    pub fn target(&self) -> Language {
        match self {
            Self::ThEn => Language::En,
            Self::EnTh => Language::Th,
        }
    }

    pub fn bundle(&self) -> &'static BundleSpec {
        match self {
            Self::ThEn => &SCB_TH_EN,
            Self::EnTh => &SCB_EN_TH,
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source(), self.target())
    }
}

/// Catalogue entry for a packaged checkpoint + vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSpec {
    /// Corpus name, also the install directory name
    pub name: &'static str,
    pub version: &'static str,
    /// Top-level directory inside the archive; the archive file is `<stem>.tar.gz`
    pub stem: &'static str,
    pub source: Language,
    pub target: Language,
    /// Sentencepiece model, relative to `<stem>/`
    pub sentencepiece_model: Option<&'static str>,
}

pub static SCB_EN_TH: BundleSpec = BundleSpec {
    name: "scb_en_th",
    version: "1.0",
    stem: "SCB_1M-MT_OPUS+TBASE_en-th_moses-newmm_space_130000-130000_v1.0",
    source: Language::En,
    target: Language::Th,
    sentencepiece_model: None,
};

pub static SCB_TH_EN: BundleSpec = BundleSpec {
    name: "scb_th_en",
    version: "1.0",
    stem: "SCB_1M-MT_OPUS+TBASE_th-en_spm-moses_16000-130000_v1.0",
    source: Language::Th,
    target: Language::En,
    sentencepiece_model: Some("bpe/spm.th.model"),
};

impl BundleSpec {
    pub fn archive_file_name(&self) -> String {
        format!("{}.tar.gz", self.stem)
    }

    /// Directory holding models/, vocab/ and bpe/ below an install root
    pub fn content_dir(&self, install_root: &Path) -> PathBuf {
        install_root.join(self.stem)
    }

    /// Engine construction parameters for this bundle installed at `install_root`.
    ///
    /// Decoding is left at the engine default; callers pick it per direction.
    pub fn engine_spec(&self, install_root: &Path) -> EngineSpec {
        let content = self.content_dir(install_root);
        EngineSpec {
            checkpoint: content.join("models").join("checkpoint.pt"),
            vocab_dir: content.join("vocab"),
            source_lang: self.source,
            target_lang: self.target,
            subword: self.sentencepiece_model.map(|model| SubwordConfig::Sentencepiece {
                model: content.join(model),
            }),
            decode: DecodeOptions::default(),
        }
    }
}
