//! Parley gateway — WebSocket surface for the live speech translation relay.
//!
//! Composition root: collaborator clients are constructed once here and
//! injected into the shared [`Relay`]; each accepted connection gets its own
//! task in `ws.rs`.

mod ws;

use axum::{routing::get, Router};
use parley_relay::{ChatTranslator, LiveSttConnector, Relay, RelayConfig, SpeechSynthesizer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let stt = Arc::new(LiveSttConnector::new(
        config.stt_ws_url.clone(),
        config.stt_api_key.clone(),
    ));
    let translator = Arc::new(ChatTranslator::new(config.translate.clone()));
    let synthesizer = Arc::new(SpeechSynthesizer::new(config.synth.clone()));
    let relay = Arc::new(Relay::new(config, stt, translator, synthesizer));

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws/audio", get(ws::audio_ws))
        .route("/ws/browser", get(ws::browser_ws))
        .route("/ws/conversation", get(ws::conversation_ws))
        .with_state(relay);

    tracing::info!("🚀 Parley relay listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "OK"
}
