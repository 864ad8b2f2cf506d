//! Transport to the generation service.
//!
//! Two calls, both stateless: `submit` posts the text and returns the audio
//! bytes once the service has finished, `fetch_progress` reads the service's
//! current progress.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, JobError};
use crate::wire::{ErrorBody, ProgressBody, GENERATE_SOUNDS_PATH, PROGRESS_PATH};
use crate::{JobRequest, ProgressSnapshot, RawArtifact};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Message used when a rejection carries no `error` text of its own.
pub const DEFAULT_REJECTION_MESSAGE: &str = "sound generation failed";

#[async_trait]
pub trait JobClient: Send + Sync {
    async fn submit(&self, request: &JobRequest) -> Result<RawArtifact, JobError>;

    async fn fetch_progress(&self) -> Result<ProgressSnapshot, JobError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub struct HttpJobClient {
    client: Client,
    generate_url: Url,
    progress_url: Url,
}

impl HttpJobClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("audio/mpeg, application/json"),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            generate_url: endpoint(&config.base_url, GENERATE_SOUNDS_PATH)?,
            progress_url: endpoint(&config.base_url, PROGRESS_PATH)?,
        })
    }

    pub fn generate_url(&self) -> &Url {
        &self.generate_url
    }

    pub fn progress_url(&self) -> &Url {
        &self.progress_url
    }
}

#[async_trait]
impl JobClient for HttpJobClient {
    async fn submit(&self, request: &JobRequest) -> Result<RawArtifact, JobError> {
        debug!(url = %self.generate_url, chars = request.text.len(), "posting generation request");
        let response = self
            .client
            .post(self.generate_url.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(status, response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if content_type.as_deref().is_some_and(is_json) {
            return Err(JobError::Decode(
                "expected an audio payload, got a JSON document".to_string(),
            ));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(JobError::Decode("empty audio payload".to_string()));
        }
        debug!(bytes = bytes.len(), "generation request returned artifact");

        Ok(RawArtifact {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn fetch_progress(&self) -> Result<ProgressSnapshot, JobError> {
        let response = self.client.get(self.progress_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::Transport(format!(
                "progress request failed with status {status}"
            )));
        }

        let body = response.bytes().await?;
        let progress: ProgressBody = serde_json::from_slice(&body)
            .map_err(|e| JobError::Decode(format!("invalid progress body: {e}")))?;
        Ok(progress.into())
    }
}

async fn rejection(status: StatusCode, response: Response) -> JobError {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => return e.into(),
    };

    match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error: Some(message),
        }) if !message.is_empty() => JobError::service(status.as_u16(), message),
        Ok(_) => JobError::service(status.as_u16(), DEFAULT_REJECTION_MESSAGE),
        Err(e) => JobError::Decode(format!("unreadable error body (status {status}): {e}")),
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Appends `path` to `base`, keeping any path prefix the base carries.
fn endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
    if base.cannot_be_a_base() {
        return Err(ConfigError::NotABase(base.to_string()));
    }
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> (HttpJobClient, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let config = ClientConfig::new(&format!("http://{addr}")).unwrap();
        (HttpJobClient::new(config).unwrap(), handle)
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let base = Url::parse("http://localhost:5000").unwrap();
        assert_eq!(
            endpoint(&base, GENERATE_SOUNDS_PATH).unwrap().as_str(),
            "http://localhost:5000/generate-sounds"
        );

        let prefixed = Url::parse("http://example.test/api").unwrap();
        assert_eq!(
            endpoint(&prefixed, PROGRESS_PATH).unwrap().as_str(),
            "http://example.test/api/progress"
        );
    }

    #[test]
    fn rejects_bases_without_paths() {
        let base = Url::parse("mailto:someone@example.test").unwrap();
        assert!(matches!(
            endpoint(&base, PROGRESS_PATH),
            Err(ConfigError::NotABase(_))
        ));
    }

    #[tokio::test]
    async fn submit_returns_audio_bytes() {
        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|Json(request): Json<JobRequest>| async move {
                assert_eq!(request.text, "rain on a tin roof");
                ([(header::CONTENT_TYPE, "audio/mpeg")], vec![0x01u8, 0x02])
            }),
        );
        let (client, server) = serve(app).await;

        let artifact = client
            .submit(&JobRequest::new("rain on a tin roof"))
            .await
            .unwrap();
        assert_eq!(artifact.bytes, vec![0x01, 0x02]);
        assert_eq!(artifact.content_type.as_deref(), Some("audio/mpeg"));
        server.abort();
    }

    #[tokio::test]
    async fn submit_surfaces_service_error_message() {
        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({ "error": "empty text" })),
                )
            }),
        );
        let (client, server) = serve(app).await;

        let err = client.submit(&JobRequest::new("")).await.unwrap_err();
        assert_eq!(err, JobError::service(400, "empty text"));
        server.abort();
    }

    #[tokio::test]
    async fn submit_falls_back_when_rejection_has_no_message() {
        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({}))) }),
        );
        let (client, server) = serve(app).await;

        let err = client.submit(&JobRequest::new("x")).await.unwrap_err();
        assert_eq!(err, JobError::service(500, DEFAULT_REJECTION_MESSAGE));
        server.abort();
    }

    #[tokio::test]
    async fn submit_with_unreadable_rejection_is_decode_error() {
        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|| async { (AxumStatus::BAD_GATEWAY, "<html>upstream down</html>") }),
        );
        let (client, server) = serve(app).await;

        let err = client.submit(&JobRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, JobError::Decode(_)), "{err:?}");
        server.abort();
    }

    #[tokio::test]
    async fn submit_rejects_json_or_empty_success_bodies() {
        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|| async { Json(json!({ "status": "ok" })) }),
        );
        let (client, server) = serve(app).await;
        let err = client.submit(&JobRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, JobError::Decode(_)), "{err:?}");
        server.abort();

        let app = Router::new().route(
            GENERATE_SOUNDS_PATH,
            post(|| async { AxumStatus::OK.into_response() }),
        );
        let (client, server) = serve(app).await;
        let err = client.submit(&JobRequest::new("x")).await.unwrap_err();
        assert_eq!(err, JobError::Decode("empty audio payload".into()));
        server.abort();
    }

    #[tokio::test]
    async fn fetch_progress_decodes_snapshot() {
        let app = Router::new().route(
            PROGRESS_PATH,
            get(|| async { Json(json!({ "progress": 40, "message": "rendering" })) }),
        );
        let (client, server) = serve(app).await;

        let snapshot = client.fetch_progress().await.unwrap();
        assert_eq!(snapshot, ProgressSnapshot::new(40, "rendering"));
        server.abort();
    }

    #[tokio::test]
    async fn fetch_progress_status_failure_is_transport_error() {
        let app = Router::new().route(
            PROGRESS_PATH,
            get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let (client, server) = serve(app).await;

        let err = client.fetch_progress().await.unwrap_err();
        assert!(matches!(err, JobError::Transport(_)), "{err:?}");
        server.abort();
    }

    #[tokio::test]
    async fn fetch_progress_invalid_json_is_decode_error() {
        let app = Router::new().route(PROGRESS_PATH, get(|| async { "not json" }));
        let (client, server) = serve(app).await;

        let err = client.fetch_progress().await.unwrap_err();
        assert!(matches!(err, JobError::Decode(_)), "{err:?}");
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpJobClient::new(ClientConfig::new(&format!("http://{addr}")).unwrap()).unwrap();
        let err = client.fetch_progress().await.unwrap_err();
        assert!(matches!(err, JobError::Transport(_)), "{err:?}");
        let err = client.submit(&JobRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, JobError::Transport(_)), "{err:?}");
    }
}
