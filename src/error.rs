use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model loading error: {0}")]
    ModelLoad(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Prompt uses {prompt_tokens} tokens but max_length is {max_length}")]
    PromptTooLong {
        prompt_tokens: usize,
        max_length: usize,
    },

    #[error("Hub error: {0}")]
    Hub(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Coarse classification used to pick an HTTP status at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was rejected before reaching the model.
    Client,
    /// Tokenization, the token budget, the forward pass, decoding or the
    /// host failed.
    Generation,
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::InvalidRequest(_) => ErrorKind::Client,
            _ => ErrorKind::Generation,
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_requests_are_client_errors() {
        let err = InferenceError::InvalidRequest("max_length must be positive".into());
        assert_eq!(err.kind(), ErrorKind::Client);
    }

    #[test]
    fn exhausted_budget_is_a_generation_error() {
        let err = InferenceError::PromptTooLong {
            prompt_tokens: 40,
            max_length: 16,
        };
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn everything_else_is_a_generation_error() {
        assert_eq!(
            InferenceError::Inference("oom".into()).kind(),
            ErrorKind::Generation
        );
        assert_eq!(
            InferenceError::Tokenizer("bad utf8".into()).kind(),
            ErrorKind::Generation
        );
        assert_eq!(
            InferenceError::Decode("bad id".into()).kind(),
            ErrorKind::Generation
        );
    }
}
