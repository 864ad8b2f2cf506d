use std::env;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stub_server::app;
use stub_server::state::{AppState, StubConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stub_server=info,tower_http=debug".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let addr = env::var("STUB_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());
    let client_origin = match env::var("CLIENT_URL") {
        Ok(url) => Some(url.parse::<HeaderValue>()?),
        Err(_) => None,
    };

    let state = AppState::new(StubConfig::from_env()?);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "stub generation service listening");
    axum::serve(listener, app(state, client_origin)).await?;
    Ok(())
}
