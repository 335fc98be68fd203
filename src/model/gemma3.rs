use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::gemma3::{Config, Model};
use serde_json::Value;
use tracing::info;

use super::LanguageModel;
use crate::error::{InferenceError, Result};

/// Layers per local/global attention cycle when the config omits it.
const DEFAULT_SLIDING_WINDOW_PATTERN: u64 = 6;

pub struct Gemma3Model {
    model: Model,
    eos_token_id: u32,
}

impl Gemma3Model {
    pub fn load(config_path: &Path, weight_paths: &[PathBuf], device: &Device) -> Result<Self> {
        info!("Loading Gemma 3 model configuration...");
        let config_str = std::fs::read_to_string(config_path)?;
        let mut config_json: Value = serde_json::from_str(&config_str)?;

        let eos_token_id = eos_token_id(&config_json);
        normalize_config(&mut config_json)?;
        let config: Config = serde_json::from_value(config_json)?;

        info!(
            "Gemma 3 config: vocab_size={}, hidden_size={}, num_layers={}, num_heads={}, head_dim={}",
            config.vocab_size,
            config.hidden_size,
            config.num_hidden_layers,
            config.num_attention_heads,
            config.head_dim
        );

        let dtype = if device.is_cuda() {
            DType::BF16
        } else {
            DType::F32
        };

        // SAFETY: the weight files are owned by the hub cache and not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(weight_paths, dtype, device)? };

        info!("Building Gemma 3 model...");
        let model = Model::new(false, &config, vb)?;

        info!("Gemma 3 model loaded, eos_token_id={}", eos_token_id);
        Ok(Self {
            model,
            eos_token_id,
        })
    }
}

impl LanguageModel for Gemma3Model {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, position)?)
    }

    fn reset_cache(&mut self) {
        self.model.clear_kv_cache();
    }

    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}

/// `eos_token_id` may be a number or a list; Gemma uses 1 when absent.
fn eos_token_id(config: &Value) -> u32 {
    config
        .get("eos_token_id")
        .and_then(|v| v.as_u64().or_else(|| v.as_array()?.first()?.as_u64()))
        .unwrap_or(1) as u32
}

/// Newer `transformers` exports write `_sliding_window_pattern` or only
/// `layer_types`; candle expects `sliding_window_pattern`.
fn normalize_config(config: &mut Value) -> Result<()> {
    let obj = config
        .as_object_mut()
        .ok_or_else(|| InferenceError::ModelLoad("config.json is not an object".to_string()))?;

    if obj.contains_key("sliding_window_pattern") {
        return Ok(());
    }

    let pattern = obj
        .get("_sliding_window_pattern")
        .and_then(Value::as_u64)
        .or_else(|| {
            let layer_types = obj.get("layer_types")?.as_array()?;
            layer_types
                .iter()
                .position(|t| t.as_str() == Some("full_attention"))
                .map(|idx| idx as u64 + 1)
        })
        .unwrap_or(DEFAULT_SLIDING_WINDOW_PATTERN);

    obj.insert("sliding_window_pattern".to_string(), Value::from(pattern));
    Ok(())
}
