// Word-level tokenizers used around the engine call

pub mod moses;

pub use moses::MosesTokenizer;

/// Word tokenizer for one language
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn detokenize(&self, tokens: &[String]) -> String;

    /// Tokens joined by single spaces, the form the engines consume
    fn tokenize_joined(&self, text: &str) -> String {
        self.tokenize(text).join(" ")
    }
}
