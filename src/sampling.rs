use candle_core::{DType, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::GenerationParams;
use crate::error::{InferenceError, Result};

pub struct Sampler {
    /// `None` means greedy decoding.
    temperature: Option<f64>,
    top_p: f64,
    top_k: usize,
    rng: StdRng,
}

impl Sampler {
    pub fn new(params: &GenerationParams) -> Self {
        let rng = match params.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let temperature = (params.do_sample && params.temperature > 0.0)
            .then_some(params.temperature);

        Self {
            temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            rng,
        }
    }

    pub fn sample(&mut self, logits: &Tensor) -> Result<u32> {
        let logits = last_position(logits)?.to_dtype(DType::F32)?;
        let logits: Vec<f32> = logits.to_vec1()?;

        let Some(temperature) = self.temperature else {
            return argmax(&logits);
        };

        let mut ranked: Vec<(usize, f32)> = logits
            .iter()
            .map(|l| l / temperature as f32)
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        if self.top_k > 0 && self.top_k < ranked.len() {
            ranked.truncate(self.top_k);
        }

        let max_logit = ranked
            .first()
            .map(|(_, l)| *l)
            .ok_or_else(|| InferenceError::Inference("Empty logits".to_string()))?;
        let mut probs: Vec<(usize, f32)> = ranked
            .into_iter()
            .map(|(i, l)| (i, (l - max_logit).exp()))
            .collect();
        normalize(&mut probs);

        if self.top_p < 1.0 {
            let top_p = self.top_p as f32;
            let mut cumsum = 0.0f32;
            let cutoff = probs
                .iter()
                .position(|(_, p)| {
                    cumsum += p;
                    cumsum > top_p
                })
                .map(|idx| idx + 1)
                .unwrap_or(probs.len());
            probs.truncate(cutoff.max(1));
            normalize(&mut probs);
        }

        let r: f32 = self.rng.gen();
        let mut cumsum = 0.0;
        for (idx, prob) in probs.iter() {
            cumsum += prob;
            if r < cumsum {
                return Ok(*idx as u32);
            }
        }

        Ok(probs.last().map(|(i, _)| *i as u32).unwrap_or(0))
    }
}

fn normalize(probs: &mut [(usize, f32)]) {
    let sum: f32 = probs.iter().map(|(_, p)| p).sum();
    if sum > 0.0 {
        for (_, p) in probs.iter_mut() {
            *p /= sum;
        }
    }
}

fn argmax(logits: &[f32]) -> Result<u32> {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx as u32)
        .ok_or_else(|| InferenceError::Inference("Empty logits".to_string()))
}

/// Reduces `[vocab]`, `[seq, vocab]` or `[batch, seq, vocab]` logits to the
/// vocabulary row of the last position.
pub fn last_position(logits: &Tensor) -> Result<Tensor> {
    let dims = logits.dims();
    match dims.len() {
        1 => Ok(logits.clone()),
        2 => Ok(logits.get(dims[0] - 1)?),
        3 => Ok(logits.get(0)?.get(dims[1] - 1)?),
        n => Err(InferenceError::Inference(format!(
            "Unexpected logits rank {}",
            n
        ))),
    }
}
