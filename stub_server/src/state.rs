use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use musifyr_client::wire::ProgressBody;
use tokio::sync::RwLock;

/// Placeholder audio: an empty ID3v2 tag followed by a little silence.
const PLACEHOLDER_AUDIO: &[u8] = &[
    0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// How a simulated generation run behaves.
#[derive(Clone, Debug)]
pub struct StubConfig {
    pub steps: u8,
    pub step_delay: Duration,
    pub audio: Vec<u8>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            steps: 5,
            step_delay: Duration::from_secs(1),
            audio: PLACEHOLDER_AUDIO.to_vec(),
        }
    }
}

impl StubConfig {
    /// Reads `STUB_STEPS`, `STUB_STEP_DELAY_MS` and `STUB_AUDIO_PATH`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();
        if let Ok(steps) = std::env::var("STUB_STEPS") {
            config.steps = steps.parse()?;
        }
        if let Ok(delay) = std::env::var("STUB_STEP_DELAY_MS") {
            config.step_delay = Duration::from_millis(delay.parse()?);
        }
        if let Ok(path) = std::env::var("STUB_AUDIO_PATH") {
            config.audio = std::fs::read(Path::new(&path))?;
        }
        Ok(config)
    }
}

/// Shared by all handlers: one generator and its progress.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<StubConfig>,
    pub progress: Arc<RwLock<ProgressBody>>,
    busy: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: StubConfig) -> Self {
        AppState {
            config: Arc::new(config),
            progress: Arc::new(RwLock::new(ProgressBody::new(0, "idle"))),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claims the generator until the returned guard is dropped. `None` if a
    /// run is already going.
    pub fn try_begin(&self) -> Option<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(Arc::clone(&self.busy)))
    }

    pub async fn set_progress(&self, progress: i64, message: impl Into<String>) {
        *self.progress.write().await = ProgressBody::new(progress, message);
    }
}

/// Frees the generator on drop, including when a client hangs up mid-run.
pub struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
