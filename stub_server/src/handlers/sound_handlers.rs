use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use musifyr_client::wire::{ErrorBody, ProgressBody};
use musifyr_client::{JobRequest, DEFAULT_AUDIO_CONTENT_TYPE};
use tracing::info;

use crate::state::AppState;

/// Percent reported after `step` of `steps`. The last step stops short of
/// 100; only a finished run reports completion.
pub fn step_percent(step: u8, steps: u8) -> i64 {
    let steps = i64::from(steps.max(1));
    (i64::from(step) * 99 / steps).min(99)
}

/// POST /generate-sounds
pub async fn generate_sounds(
    Extension(state): Extension<AppState>,
    Json(payload): Json<JobRequest>,
) -> Response {
    if payload.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("empty text"))).into_response();
    }
    let Some(_run) = state.try_begin() else {
        return (
            StatusCode::CONFLICT,
            Json(ErrorBody::new("generation already running")),
        )
            .into_response();
    };

    info!(chars = payload.text.len(), "generation started");
    state.set_progress(0, "starting").await;

    let steps = state.config.steps.max(1);
    for step in 1..=steps {
        tokio::time::sleep(state.config.step_delay).await;
        state
            .set_progress(
                step_percent(step, steps),
                format!("rendering layer {step}/{steps}"),
            )
            .await;
    }

    state.set_progress(100, "done").await;
    info!(bytes = state.config.audio.len(), "generation finished");

    (
        [(header::CONTENT_TYPE, DEFAULT_AUDIO_CONTENT_TYPE)],
        state.config.audio.clone(),
    )
        .into_response()
}

/// GET /progress
pub async fn progress(Extension(state): Extension<AppState>) -> Json<ProgressBody> {
    Json(state.progress.read().await.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_climb_but_never_report_completion() {
        assert_eq!(step_percent(1, 3), 33);
        assert_eq!(step_percent(2, 3), 66);
        assert_eq!(step_percent(3, 3), 99);
        assert_eq!(step_percent(1, 0), 99);
    }
}
