use clap::Parser;

/// Hugging Face model the service is built around.
pub const MODEL_ID: &str = "google/gemma-3-270m";
pub const MODEL_REVISION: &str = "main";

pub const DEFAULT_MAX_LENGTH: usize = 1024;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Step-by-step explanations for Mozambican exam questions")]
pub struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    #[arg(long)]
    pub cpu: bool,

    #[arg(long, env)]
    pub hf_token: Option<String>,

    /// Seed for the sampler; 0 draws from OS entropy on every request
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Explain a single question on stdout instead of starting the server
    #[arg(short, long)]
    pub question: Option<String>,

    /// Answer alternative for --question; repeat once per alternative
    #[arg(short = 'o', long = "option", requires = "question")]
    pub options: Vec<String>,

    /// Token budget for --question, prompt included
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    pub max_length: usize,
}

/// Parameters for one generation call.
///
/// `max_length` bounds the whole sequence, prompt included.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_length: usize,
    pub do_sample: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            do_sample: true,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 64,
            seed: None,
        }
    }
}

impl GenerationParams {
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }
}
