use std::path::Path;
use std::str::FromStr;

use tokenizers::Tokenizer;
use tracing::info;

use crate::error::{InferenceError, Result};

/// Tokens that end a Gemma completion.
const STOP_TOKENS: [&str; 4] = ["<eos>", "<end_of_turn>", "</s>", "<|endoftext|>"];

pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
}

impl TokenizerWrapper {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading tokenizer from {:?}", path);
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        info!("Tokenizer loaded with {} tokens", tokenizer.get_vocab_size(true));
        Ok(Self { tokenizer })
    }

    /// Builds a tokenizer from a serialized `tokenizer.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let tokenizer =
            Tokenizer::from_str(json).map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        Ok(Self { tokenizer })
    }

    /// Encodes with the tokenizer's post-processor, so Gemma gets its `<bos>`.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        Ok(encoding.get_ids().to_vec())
    }

    /// Decodes with special tokens stripped.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| InferenceError::Decode(e.to_string()))
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn stop_token_ids(&self) -> Vec<u32> {
        STOP_TOKENS
            .iter()
            .filter_map(|t| self.tokenizer.token_to_id(t))
            .collect()
    }
}
