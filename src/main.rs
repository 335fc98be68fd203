use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exam_explainer::api::{self, AppState};
use exam_explainer::config::{Args, MODEL_ID, MODEL_REVISION};
use exam_explainer::device::{device_label, select_device};
use exam_explainer::explainer::{explain, QuestionRequest};
use exam_explainer::generation::CandleGenerator;
use exam_explainer::model::{download_model, Gemma3Model};
use exam_explainer::tokenizer::TokenizerWrapper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "exam_explainer=info,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let device = select_device(args.cpu);
    info!("Using device: {}", device_label(&device));

    let files = download_model(MODEL_ID, MODEL_REVISION, args.hf_token.as_deref())?;
    let tokenizer = TokenizerWrapper::load(&files.tokenizer)?;
    let model = Gemma3Model::load(&files.config, &files.weights, &device)?;
    info!(
        "Model {} ready, vocabulary size {}",
        MODEL_ID,
        tokenizer.vocab_size()
    );

    let seed = (args.seed != 0).then_some(args.seed);
    let generator =
        CandleGenerator::new(Box::new(model), tokenizer, device, MODEL_ID).with_seed(seed);

    match args.question.clone() {
        Some(question) => run_single_question(&generator, question, &args),
        None => run_server(generator, &args).await,
    }
}

fn run_single_question(
    generator: &CandleGenerator,
    question: String,
    args: &Args,
) -> anyhow::Result<()> {
    let mut request = QuestionRequest::new(question, args.options.clone());
    request.max_length = args.max_length;

    let answer = explain(generator, &request)?;
    println!("{}", answer.generated_text);
    Ok(())
}

async fn run_server(generator: CandleGenerator, args: &Args) -> anyhow::Result<()> {
    let device = device_label(generator.device());
    let state = Arc::new(AppState::new(Arc::new(generator), device));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::new(args.host.parse()?, args.port);
    info!("Listening on http://{} (POST /ask, GET /health, GET /test)", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
