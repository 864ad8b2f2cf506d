use axum::routing::{get, post};
use axum::{Extension, Router};
use musifyr_client::wire::{GENERATE_SOUNDS_PATH, PROGRESS_PATH};

use crate::handlers::sound_handlers::{generate_sounds, progress};
use crate::state::AppState;

pub fn sound_routes(state: AppState) -> Router {
    Router::new()
        .route(GENERATE_SOUNDS_PATH, post(generate_sounds))
        .route(PROGRESS_PATH, get(progress))
        .layer(Extension(state))
}
