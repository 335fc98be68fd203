//! HTTP tests for the question endpoint.
//!
//! The router runs against stub generation services, so no model weights are
//! downloaded.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use exam_explainer::api::{create_router, AppState};
use exam_explainer::config::GenerationParams;
use exam_explainer::error::{InferenceError, Result};
use exam_explainer::generation::{GenerationOutput, GenerationService};

/// One token per byte of the prompt, followed by a canned explanation.
struct StubGenerator {
    reply: &'static str,
    calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl StubGenerator {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl GenerationService for StubGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), params.clone()));

        let tokens: Vec<u32> = prompt
            .bytes()
            .chain(self.reply.bytes())
            .map(u32::from)
            .collect();
        if tokens.len() > params.max_length {
            return Err(InferenceError::PromptTooLong {
                prompt_tokens: prompt.len(),
                max_length: params.max_length,
            });
        }
        Ok(GenerationOutput {
            tokens,
            prompt_len: prompt.len(),
        })
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        let bytes: Vec<u8> = tokens.iter().map(|&t| t as u8).collect();
        String::from_utf8(bytes).map_err(|e| InferenceError::Decode(e.to_string()))
    }

    fn model_id(&self) -> &str {
        "stub/gemma"
    }
}

struct FailingGenerator;

impl GenerationService for FailingGenerator {
    fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<GenerationOutput> {
        Err(InferenceError::Inference("CUDA out of memory".to_string()))
    }

    fn decode(&self, _tokens: &[u32]) -> Result<String> {
        Ok(String::new())
    }

    fn model_id(&self) -> &str {
        "stub/failing"
    }
}

struct PanickingGenerator;

impl GenerationService for PanickingGenerator {
    fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<GenerationOutput> {
        panic!("kernel crashed");
    }

    fn decode(&self, _tokens: &[u32]) -> Result<String> {
        Ok(String::new())
    }

    fn model_id(&self) -> &str {
        "stub/panicking"
    }
}

fn app(generator: Arc<dyn GenerationService>) -> Router {
    create_router(Arc::new(AppState::new(generator, "CPU")))
}

fn post_ask(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn answers_a_multiple_choice_question() {
    let stub = Arc::new(StubGenerator::new(" A soma de 2 e 2 é 4."));
    let body = json!({"question": "Qual é 2+2?", "options": ["3", "4", "5"]}).to_string();

    let (status, body) = send(app(stub.clone()), post_ask(body)).await;

    assert_eq!(status, StatusCode::OK);
    let text = body["generated_text"].as_str().unwrap();
    assert!(!text.is_empty());
    assert!(text.contains("Questão: Qual é 2+2?"));
    assert!(text.contains("Alternativas: 3, 4, 5"));
    assert!(text.ends_with("A soma de 2 e 2 é 4."));

    let calls = stub.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (prompt, params) = &calls[0];
    assert!(prompt.contains("Questão: Qual é 2+2?"));
    assert!(prompt.contains("Alternativas: 3, 4, 5"));
    assert!(prompt.ends_with("Explique o raciocínio passo a passo:"));
    assert_eq!(params.max_length, 1024);
    assert!(params.do_sample);
    assert_eq!(params.temperature, 0.7);
}

#[tokio::test]
async fn max_length_is_passed_through() {
    let stub = Arc::new(StubGenerator::new("ok"));
    let body = json!({"question": "q", "options": [], "max_length": 512}).to_string();

    let (status, _) = send(app(stub.clone()), post_ask(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.calls.lock().unwrap()[0].1.max_length, 512);
}

#[tokio::test]
async fn echo_false_returns_only_the_explanation() {
    let stub = Arc::new(StubGenerator::new("Passo 1: somar."));
    let body = json!({"question": "Qual é 2+2?", "options": ["4"], "echo": false}).to_string();

    let (status, body) = send(app(stub), post_ask(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated_text"], "Passo 1: somar.");
}

#[tokio::test]
async fn generation_failure_is_500_with_detail() {
    let body = json!({"question": "q", "options": ["a"]}).to_string();

    let (status, body) = send(app(Arc::new(FailingGenerator)), post_ask(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let expected = InferenceError::Inference("CUDA out of memory".to_string()).to_string();
    assert_eq!(body, json!({ "detail": expected }));
}

#[tokio::test]
async fn panicking_generation_is_500() {
    let body = json!({"question": "q", "options": []}).to_string();

    let (status, body) = send(app(Arc::new(PanickingGenerator)), post_ask(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Generation task failed"));
}

#[tokio::test]
async fn zero_max_length_is_rejected() {
    let stub = Arc::new(StubGenerator::new("x"));
    let body = json!({"question": "q", "options": [], "max_length": 0}).to_string();

    let (status, body) = send(app(stub.clone()), post_ask(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("max_length"));
    assert!(stub.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn negative_max_length_is_rejected() {
    let stub = Arc::new(StubGenerator::new("x"));
    let body = json!({"question": "q", "options": [], "max_length": -5}).to_string();

    let (status, body) = send(app(stub.clone()), post_ask(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
    assert!(stub.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prompt_longer_than_budget_is_a_generation_failure() {
    let body = json!({"question": "q", "options": [], "max_length": 10}).to_string();

    let (status, body) = send(app(Arc::new(StubGenerator::new("x"))), post_ask(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().ends_with("but max_length is 10"));
}

#[tokio::test]
async fn missing_question_is_rejected() {
    let body = json!({"options": ["a"]}).to_string();

    let (status, body) = send(app(Arc::new(StubGenerator::new("x"))), post_ask(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("question"));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (status, body) = send(
        app(Arc::new(StubGenerator::new("x"))),
        post_ask("{\"question\": ".to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn health_reports_model_and_device() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app(Arc::new(StubGenerator::new("x"))), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "model": "stub/gemma", "device": "CPU"})
    );
}

#[tokio::test]
async fn history_is_folded_into_the_prompt() {
    let stub = Arc::new(StubGenerator::new("ok"));
    let body = json!({
        "question": "Qual é 2+2?",
        "options": ["3", "4"],
        "history": [
            {"role": "user", "parts": [{"text": "Preciso de uma dica."}]},
            {"role": "model", "parts": [{"text": "Conte nos dedos."}]}
        ]
    })
    .to_string();

    let (status, _) = send(app(stub.clone()), post_ask(body)).await;

    assert_eq!(status, StatusCode::OK);
    let prompt = &stub.calls.lock().unwrap()[0].0;
    assert!(prompt.contains("Alternativas: 3, 4\nHistórico:\n"));
    assert!(prompt.contains("1. user: Preciso de uma dica.\n2. model: Conte nos dedos.\n"));
    assert!(prompt.ends_with("\n\nExplique o raciocínio passo a passo:"));
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn self_test_runs_the_canned_question() {
    let stub = Arc::new(StubGenerator::new("Maputo."));

    let (status, body) = send(app(stub.clone()), get("/test")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "stub/gemma");
    assert_eq!(body["question"], "Qual é a capital de Moçambique?");
    assert_eq!(body["response"], "Maputo.");
    assert!(stub.calls.lock().unwrap()[0]
        .0
        .contains("Alternativas: Maputo, Beira, Nampula, Quelimane"));
}

#[tokio::test]
async fn failing_self_test_is_500() {
    let (status, body) = send(app(Arc::new(FailingGenerator)), get("/test")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Inference error: CUDA out of memory");
}
