pub mod handlers;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use routes::sounds::sound_routes;
use state::AppState;

/// The stub generation service. `client_origin` enables CORS for a browser
/// front end served from that origin.
pub fn app(state: AppState, client_origin: Option<HeaderValue>) -> Router {
    let app = sound_routes(state).layer(TraceLayer::new_for_http());

    match client_origin {
        Some(origin) => app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        ),
        None => app,
    }
}
