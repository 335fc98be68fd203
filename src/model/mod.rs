mod gemma3;
mod loader;

pub use gemma3::Gemma3Model;
pub use loader::{download_model, ModelFiles};

use candle_core::Tensor;
use crate::error::Result;

/// A causal language model that produces next-token logits.
pub trait LanguageModel: Send {
    /// Forward pass over `input_ids` (shape `[1, seq]`) starting at `position`.
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor>;

    /// Drop the KV cache before a new sequence.
    fn reset_cache(&mut self);

    fn eos_token_id(&self) -> u32;
}
