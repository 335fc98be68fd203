use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use candle_core::{Device, Tensor};
use tracing::{debug, info};

use crate::config::GenerationParams;
use crate::error::{InferenceError, Result};
use crate::model::LanguageModel;
use crate::sampling::Sampler;
use crate::tokenizer::TokenizerWrapper;

/// Full token sequence of one generation: the prompt followed by the continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub tokens: Vec<u32>,
    pub prompt_len: usize,
}

impl GenerationOutput {
    pub fn continuation(&self) -> &[u32] {
        &self.tokens[self.prompt_len.min(self.tokens.len())..]
    }
}

/// Turns a prompt into tokens and tokens into text.
///
/// Calls block until the whole sequence is produced; run them off the async
/// runtime.
pub trait GenerationService: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationOutput>;

    /// Decodes with special tokens stripped.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    fn model_id(&self) -> &str;
}

/// Generation backed by a candle model held for the lifetime of the process.
pub struct CandleGenerator {
    model: Mutex<Box<dyn LanguageModel>>,
    tokenizer: TokenizerWrapper,
    device: Device,
    model_id: String,
    seed: Option<u64>,
}

impl CandleGenerator {
    pub fn new(
        model: Box<dyn LanguageModel>,
        tokenizer: TokenizerWrapper,
        device: Device,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            model_id: model_id.into(),
            seed: None,
        }
    }

    /// Process-wide sampler seed; `None` draws from OS entropy per call.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl GenerationService for CandleGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationOutput> {
        // A panicked generation only leaves a stale KV cache behind, and
        // every generation resets it first.
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);

        let mut params = params.clone();
        params.seed = params.seed.or(self.seed);

        TextGenerator::new(model.as_mut(), &self.tokenizer, &self.device).generate(prompt, &params)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer.decode(tokens)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

pub struct TextGenerator<'a> {
    model: &'a mut dyn LanguageModel,
    tokenizer: &'a TokenizerWrapper,
    device: &'a Device,
}

impl<'a> TextGenerator<'a> {
    pub fn new(
        model: &'a mut dyn LanguageModel,
        tokenizer: &'a TokenizerWrapper,
        device: &'a Device,
    ) -> Self {
        Self {
            model,
            tokenizer,
            device,
        }
    }

    /// Samples until a stop token or until the sequence reaches
    /// `params.max_length` tokens, prompt included.
    pub fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<GenerationOutput> {
        if params.max_length == 0 {
            return Err(InferenceError::InvalidRequest(
                "max_length must be a positive integer".to_string(),
            ));
        }

        let start_time = Instant::now();
        self.model.reset_cache();

        let prompt_tokens = self.tokenizer.encode(prompt)?;
        let prompt_len = prompt_tokens.len();
        if prompt_tokens.is_empty() {
            return Err(InferenceError::Inference("Empty prompt".to_string()));
        }

        let max_new_tokens = params.max_length.saturating_sub(prompt_len);
        if max_new_tokens == 0 {
            return Err(InferenceError::PromptTooLong {
                prompt_tokens: prompt_len,
                max_length: params.max_length,
            });
        }
        info!(
            "Prompt tokens: {}, budget for new tokens: {}",
            prompt_len, max_new_tokens
        );

        let mut stop_tokens = self.tokenizer.stop_token_ids();
        stop_tokens.push(self.model.eos_token_id());

        let mut sampler = Sampler::new(params);
        let mut tokens = prompt_tokens;

        // Prefill
        let input = Tensor::new(tokens.as_slice(), self.device)?.unsqueeze(0)?;
        let mut logits = self.model.forward(&input, 0)?;

        let generation_start = Instant::now();
        for i in 0..max_new_tokens {
            let next_token = sampler.sample(&logits)?;

            if stop_tokens.contains(&next_token) {
                debug!("Stop token {} generated at step {}", next_token, i);
                break;
            }
            tokens.push(next_token);

            if i + 1 == max_new_tokens {
                break;
            }
            let input = Tensor::new(&[next_token], self.device)?.unsqueeze(0)?;
            logits = self.model.forward(&input, prompt_len + i)?;
        }

        let generated = tokens.len() - prompt_len;
        let generation_time = generation_start.elapsed();
        let tokens_per_second = if generation_time.as_secs_f64() > 0.0 {
            generated as f64 / generation_time.as_secs_f64()
        } else {
            0.0
        };

        info!(
            "Generated {} tokens in {:?} ({:.2} tokens/sec, {}ms total)",
            generated,
            generation_time,
            tokens_per_second,
            start_time.elapsed().as_millis()
        );

        Ok(GenerationOutput { tokens, prompt_len })
    }
}
