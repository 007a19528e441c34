// Per-direction processing around the engine call.
//
// Each bundle's vocabulary expects differently prepared text:
// - en->th: Moses word tokens in, default decoding, "▁" -> " " on the way out
// - th->en: raw text in (sentencepiece runs inside the engine), beam 4, output as-is

use crate::engine::DecodeOptions;
use crate::language::LanguagePair;
use crate::tokenize::Tokenizer;

/// Word-boundary glyph of the Thai subword vocabulary
pub const SUBWORD_MARKER: char = '\u{2581}';

pub const TH_EN_BEAM: usize = 4;

/// Turn caller text into engine input
pub fn prepare(pair: LanguagePair, text: &str, en_tokenizer: &dyn Tokenizer) -> String {
    match pair {
        LanguagePair::EnTh => en_tokenizer.tokenize_joined(text),
        LanguagePair::ThEn => text.to_string(),
    }
}

pub fn decode_options(pair: LanguagePair) -> DecodeOptions {
    match pair {
        LanguagePair::EnTh => DecodeOptions::default(),
        LanguagePair::ThEn => DecodeOptions::with_beam(TH_EN_BEAM),
    }
}

/// Turn engine output into the caller-facing translation
pub fn finish(pair: LanguagePair, hypothesis: String) -> String {
    match pair {
        LanguagePair::EnTh => hypothesis.replace(SUBWORD_MARKER, " "),
        LanguagePair::ThEn => hypothesis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::MosesTokenizer;

    #[test]
    fn test_en_th_tokenizes_input() {
        let tokenizer = MosesTokenizer::new();
        assert_eq!(prepare(LanguagePair::EnTh, "Hello, world!", &tokenizer), "Hello , world !");
    }

    #[test]
    fn test_th_en_passes_input_through() {
        let tokenizer = MosesTokenizer::new();
        let text = "สวัสดีครับ, ยินดีที่ได้รู้จัก!";
        assert_eq!(prepare(LanguagePair::ThEn, text, &tokenizer), text);
    }

    #[test]
    fn test_decode_options_per_direction() {
        assert_eq!(decode_options(LanguagePair::ThEn).beam, Some(4));
        assert_eq!(decode_options(LanguagePair::EnTh).beam, None);
    }

    #[test]
    fn test_finish_replaces_marker_only_for_en_th() {
        assert_eq!(finish(LanguagePair::EnTh, "สวัสดี▁ครับ▁".to_string()), "สวัสดี ครับ ");
        assert_eq!(finish(LanguagePair::ThEn, "a▁b".to_string()), "a▁b");
    }
}
