//! Question → prompt → generation → text, independent of the transport.

use serde::{Deserialize, Serialize};

use crate::config::{GenerationParams, DEFAULT_MAX_LENGTH};
use crate::error::{InferenceError, Result};
use crate::generation::GenerationService;

const INTRO: &str = "Você é um explicador virtual para exames de Moçambique.";
const INSTRUCTION: &str = "Explique o raciocínio passo a passo:";

/// A multiple-choice exam question.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub options: Vec<String>,
    /// Token budget for prompt and completion together.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Return the prompt followed by the continuation (`true`) or the
    /// continuation alone.
    #[serde(default = "default_echo")]
    pub echo: bool,
    /// Earlier turns of a tutoring conversation about this question.
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

/// One conversation turn, in the `{role, parts: [{text}]}` shape the exam
/// app sends.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<HistoryPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPart {
    pub text: String,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![HistoryPart { text: text.into() }],
        }
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_echo() -> bool {
    true
}

fn default_role() -> String {
    "user".to_string()
}

impl QuestionRequest {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            options,
            max_length: DEFAULT_MAX_LENGTH,
            echo: true,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
    pub generated_text: String,
}

/// Without history the prompt is exactly intro, question, alternatives, a
/// blank line and the instruction. History turns go as a numbered block
/// between the alternatives and the blank line.
pub fn build_prompt(question: &str, options: &[String], history: &[HistoryMessage]) -> String {
    let mut prompt = format!(
        "{INTRO}\nQuestão: {question}\nAlternativas: {}\n",
        options.join(", ")
    );
    if !history.is_empty() {
        prompt.push_str("Histórico:\n");
        for (i, turn) in history.iter().enumerate() {
            prompt.push_str(&format!("{}. {}: {}\n", i + 1, turn.role, turn.text()));
        }
    }
    prompt.push('\n');
    prompt.push_str(INSTRUCTION);
    prompt
}

/// Runs one question through the generation service. Blocks.
pub fn explain(service: &dyn GenerationService, request: &QuestionRequest) -> Result<AnswerResponse> {
    if request.max_length == 0 {
        return Err(InferenceError::InvalidRequest(
            "max_length must be a positive integer".to_string(),
        ));
    }

    let prompt = build_prompt(&request.question, &request.options, &request.history);
    let params = GenerationParams::with_max_length(request.max_length);

    let output = service.generate(&prompt, &params)?;
    let generated_text = if request.echo {
        service.decode(&output.tokens)?
    } else {
        service.decode(output.continuation())?
    };

    Ok(AnswerResponse { generated_text })
}

/// Canned question used by the self-check route.
pub const SELF_TEST_QUESTION: &str = "Qual é a capital de Moçambique?";
pub const SELF_TEST_OPTIONS: [&str; 4] = ["Maputo", "Beira", "Nampula", "Quelimane"];
const SELF_TEST_MAX_LENGTH: usize = 128;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub question: String,
    /// Start of the continuation, cut at 200 chars.
    pub response: String,
}

/// Runs the canned question end to end with a short budget. Blocks.
pub fn self_test(service: &dyn GenerationService) -> Result<SelfTestReport> {
    let mut request = QuestionRequest::new(
        SELF_TEST_QUESTION,
        SELF_TEST_OPTIONS.iter().map(|o| o.to_string()).collect(),
    );
    request.max_length = SELF_TEST_MAX_LENGTH;
    request.echo = false;

    let answer = explain(service, &request)?;
    Ok(SelfTestReport {
        question: request.question,
        response: preview(&answer.generated_text),
    })
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
