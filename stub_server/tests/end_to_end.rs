use std::sync::Arc;
use std::time::Duration;

use musifyr_client::{
    ClientConfig, ControllerConfig, ErrorKind, HttpJobClient, JobClient, JobController, JobState,
};
use stub_server::app;
use stub_server::state::{AppState, StubConfig};
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn start_stub(config: StubConfig) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app(AppState::new(config), None))
            .await
            .unwrap();
    });
    (format!("http://{addr}"), handle)
}

fn controller(base_url: &str) -> JobController {
    let client = HttpJobClient::new(ClientConfig::new(base_url).unwrap()).unwrap();
    JobController::new(
        Arc::new(client),
        ControllerConfig {
            poll_interval: Duration::from_millis(20),
        },
    )
}

async fn settle(controller: &JobController) -> JobState {
    let mut rx = controller.subscribe();
    let wait = async move {
        let state = rx.wait_for(|state| state.is_terminal()).await.unwrap().clone();
        state
    };
    timeout(Duration::from_secs(10), wait)
        .await
        .expect("job did not finish in time")
}

fn quick_stub(audio: Vec<u8>) -> StubConfig {
    StubConfig {
        steps: 4,
        step_delay: Duration::from_millis(50),
        audio,
    }
}

#[tokio::test]
async fn client_follows_stub_job_to_completion() {
    let (base_url, server) = start_stub(quick_stub(vec![0x01, 0x02, 0x03])).await;
    let controller = controller(&base_url);

    controller.start("rain on a tin roof").unwrap();
    let JobState::Succeeded(result) = settle(&controller).await else {
        panic!("job failed: {:?}", controller.state());
    };

    assert_eq!(result.content_type, "audio/mpeg");
    assert_eq!(
        controller.artifacts().resolve(&result.handle).as_deref(),
        Some(&[0x01, 0x02, 0x03][..])
    );
    server.abort();
}

#[tokio::test]
async fn empty_text_is_rejected_by_the_service() {
    let (base_url, server) = start_stub(quick_stub(vec![0x01])).await;
    let controller = controller(&base_url);

    controller.start("   ").unwrap();
    let state = settle(&controller).await;
    let info = state.error().expect("job should fail");
    assert_eq!(info.kind, ErrorKind::Service);
    assert_eq!(info.message, "empty text");
    server.abort();
}

#[tokio::test]
async fn second_client_is_turned_away_while_generating() {
    let (base_url, server) = start_stub(quick_stub(vec![0x0a])).await;
    let first = controller(&base_url);
    let second = controller(&base_url);

    first.start("busy street").unwrap();
    let observer = HttpJobClient::new(ClientConfig::new(&base_url).unwrap()).unwrap();
    timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = observer.fetch_progress().await.unwrap();
            if snapshot.percent > 0 && !snapshot.is_complete() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stub never started generating");

    second.start("quiet library").unwrap();
    let rejected = settle(&second).await;
    assert_eq!(
        rejected.error().map(|e| e.message.as_str()),
        Some("generation already running")
    );

    assert!(settle(&first).await.result().is_some());
    server.abort();
}
