use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod error;
mod tts;

use api::routes::{create_router, AppState};
use tts::{fetch, RoutingPolicy, SileroEngine, SpeechModel, TtsService};

const RU_MODEL_URL: &str = "https://models.silero.ai/models/tts/ru/v3_1_ru.onnx";
const EN_MODEL_URL: &str = "https://models.silero.ai/models/tts/en/v3_en.onnx";

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration from environment
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .expect("PORT must be a number");
    let models_dir = PathBuf::from(
        std::env::var("MODELS_DIR").unwrap_or_else(|_| "./models".to_string()),
    );
    let routing = !matches!(
        std::env::var("LANGUAGE_ROUTING").as_deref(),
        Ok("0") | Ok("false") | Ok("off")
    );

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid address");

    tracing::info!("Silero TTS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Models directory: {}", models_dir.display());
    tracing::info!("Language routing: {}", if routing { "on" } else { "off" });

    std::fs::create_dir_all(&models_dir).expect("Failed to create models directory");

    // Model handles are loaded once here and shared read-only by every request.
    let ru_url = std::env::var("MODEL_URL_RU").unwrap_or_else(|_| RU_MODEL_URL.to_string());
    let default_model = load_model(&models_dir.join("model_ru.onnx"), &ru_url).await;

    let english_model = if routing {
        let en_url =
            std::env::var("MODEL_URL_EN").unwrap_or_else(|_| EN_MODEL_URL.to_string());
        Some(load_model(&models_dir.join("model_en.onnx"), &en_url).await)
    } else {
        None
    };

    let policy = if routing {
        RoutingPolicy::LanguageRouting
    } else {
        RoutingPolicy::FixedVoice
    };

    let tts = TtsService::new(default_model, english_model, policy);
    let state = Arc::new(AppState { tts: Arc::new(tts) });

    let app = create_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

/// Fetch the model archive and its sidecar config if absent, then load them.
async fn load_model(path: &Path, url: &str) -> Arc<dyn SpeechModel> {
    fetch::ensure_model(path, url)
        .await
        .unwrap_or_else(|e| panic!("Failed to fetch {}: {}", path.display(), e));

    let config_path = PathBuf::from(format!("{}.json", path.display()));
    fetch::ensure_model(&config_path, &format!("{}.json", url))
        .await
        .unwrap_or_else(|e| panic!("Failed to fetch {}: {}", config_path.display(), e));

    let engine = SileroEngine::load(path)
        .unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e));

    Arc::new(engine)
}
