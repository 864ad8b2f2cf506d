//! Lifecycle of a single generation job.
//!
//! `start` posts the text. Once the submit call returns the audio, the
//! controller holds it back and polls the progress endpoint; the job
//! succeeds when progress reaches 100. A failed submit never polls. Every
//! job is tagged with an epoch; a response whose epoch is no longer current
//! is dropped, so nothing from a cancelled job can touch the state of a
//! later one.
//!
//! Polls are strictly serialized. The next poll is scheduled one full
//! interval after the previous one settles, so a slow poll never overlaps
//! the next and missed ticks are skipped, not queued. A failed poll ends the
//! job; there is no retry.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactStore;
use crate::client::JobClient;
use crate::error::{ControllerError, ErrorInfo, JobError};
use crate::state::{JobResult, JobState};
use crate::{JobRequest, ProgressSnapshot, RawArtifact, DEFAULT_AUDIO_CONTENT_TYPE};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Drives one job at a time against a [`JobClient`].
///
/// Must be used from within a tokio runtime. Dropping the controller stops
/// its tasks and releases the artifact it holds.
pub struct JobController {
    shared: Arc<Shared>,
}

struct Shared {
    client: Arc<dyn JobClient>,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    state_tx: watch::Sender<JobState>,
    slot: Mutex<JobSlot>,
}

/// Bookkeeping for the in-flight job. State transitions happen only while
/// this is locked, so the epoch check and the write are one step.
#[derive(Default)]
struct JobSlot {
    epoch: u64,
    pending: Option<RawArtifact>,
    submit_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
}

impl JobSlot {
    fn stop(&mut self) {
        if let Some(task) = self.submit_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        self.pending = None;
    }
}

impl JobController {
    pub fn new(client: Arc<dyn JobClient>, config: ControllerConfig) -> Self {
        Self::with_store(client, config, ArtifactStore::new())
    }

    pub fn with_store(
        client: Arc<dyn JobClient>,
        config: ControllerConfig,
        artifacts: ArtifactStore,
    ) -> Self {
        let (state_tx, _) = watch::channel(JobState::Idle);
        Self {
            shared: Arc::new(Shared {
                client,
                artifacts,
                poll_interval: config.poll_interval,
                state_tx,
                slot: Mutex::new(JobSlot::default()),
            }),
        }
    }

    /// Starts a job unless one is already submitting or running.
    /// Returns the new job's epoch.
    pub fn start(&self, text: impl Into<String>) -> Result<u64, ControllerError> {
        let shared = &self.shared;
        let request = JobRequest::new(text);
        let mut slot = shared.slot();

        let busy = shared.state_tx.borrow().is_active();
        if busy {
            debug!(epoch = slot.epoch, "start ignored, job already in flight");
            return Err(ControllerError::Busy);
        }

        slot.stop();
        slot.epoch += 1;
        let epoch = slot.epoch;
        shared.transition(JobState::Submitting);
        info!(epoch, chars = request.text.len(), "job submitted");

        slot.submit_task = Some(tokio::spawn(Arc::clone(shared).run_submit(epoch, request)));
        Ok(epoch)
    }

    /// Abandons the in-flight job and returns to `Idle`. Returns `false`
    /// when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let mut slot = shared.slot();

        let active = shared.state_tx.borrow().is_active();
        if !active {
            return false;
        }

        slot.stop();
        slot.epoch += 1;
        shared.transition(JobState::Idle);
        info!(epoch = slot.epoch - 1, "job cancelled");
        true
    }

    /// Clears a finished job, releasing its artifact. Returns `false` unless
    /// the controller was in a terminal state.
    pub fn reset(&self) -> bool {
        let shared = &self.shared;
        let _slot = shared.slot();

        let terminal = shared.state_tx.borrow().is_terminal();
        if terminal {
            shared.transition(JobState::Idle);
        }
        terminal
    }

    pub fn state(&self) -> JobState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.shared.slot().epoch
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.shared.state_tx.subscribe()
    }

    /// The current state, then every change. Slow consumers may miss
    /// intermediate states but always see the latest one.
    pub fn states(&self) -> impl Stream<Item = JobState> + Send + 'static {
        futures::stream::unfold((self.subscribe(), true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let state = rx.borrow_and_update().clone();
            Some((state, (rx, false)))
        })
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.shared.artifacts
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        let mut slot = self.shared.slot();
        slot.stop();
        slot.epoch += 1;
        self.shared.transition(JobState::Idle);
    }
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, JobSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `next`. A handle held by the outgoing state is released.
    /// Callers hold the slot lock.
    fn transition(&self, next: JobState) {
        if let JobState::Succeeded(previous) = self.state_tx.send_replace(next) {
            if self.artifacts.release(&previous.handle) {
                debug!(handle = previous.handle.uri(), "released artifact");
            }
        }
    }

    fn accepts(&self, slot: &JobSlot, epoch: u64) -> bool {
        slot.epoch == epoch && self.state_tx.borrow().is_active()
    }

    async fn run_submit(self: Arc<Self>, epoch: u64, request: JobRequest) {
        let outcome = self.client.submit(&request).await;
        self.on_submitted(epoch, outcome);
    }

    async fn run_polling(self: Arc<Self>, epoch: u64) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let current = self.accepts(&self.slot(), epoch);
            if !current {
                break;
            }
            let outcome = self.client.fetch_progress().await;
            if self.on_progress(epoch, outcome).is_break() {
                break;
            }
        }
        debug!(epoch, "polling stopped");
    }

    fn on_submitted(self: &Arc<Self>, epoch: u64, outcome: Result<RawArtifact, JobError>) {
        let mut slot = self.slot();
        if !self.accepts(&slot, epoch) {
            debug!(epoch, current = slot.epoch, "discarding stale submit response");
            return;
        }

        match outcome {
            Ok(artifact) => {
                debug!(epoch, bytes = artifact.len(), "artifact received");
                slot.submit_task = None;
                slot.pending = Some(artifact);
                self.transition(JobState::Running(ProgressSnapshot::default()));
                slot.poll_task = Some(tokio::spawn(Arc::clone(self).run_polling(epoch)));
            }
            Err(err) => self.fail(&mut slot, epoch, err),
        }
    }

    fn on_progress(
        &self,
        epoch: u64,
        outcome: Result<ProgressSnapshot, JobError>,
    ) -> ControlFlow<()> {
        let mut slot = self.slot();
        if !self.accepts(&slot, epoch) {
            debug!(epoch, current = slot.epoch, "discarding stale progress response");
            return ControlFlow::Break(());
        }

        match outcome {
            Ok(snapshot) if snapshot.is_complete() => {
                debug!(epoch, message = %snapshot.message, "progress complete");
                slot.poll_task = None;
                match slot.pending.take() {
                    Some(artifact) => self.succeed(&mut slot, epoch, artifact),
                    // polling only starts once the artifact is held
                    None => self.fail(
                        &mut slot,
                        epoch,
                        JobError::Decode("progress completed without an artifact".to_string()),
                    ),
                }
                ControlFlow::Break(())
            }
            Ok(snapshot) => {
                debug!(epoch, percent = snapshot.percent, message = %snapshot.message, "progress");
                self.transition(JobState::Running(snapshot));
                ControlFlow::Continue(())
            }
            Err(err) => {
                self.fail(&mut slot, epoch, err);
                ControlFlow::Break(())
            }
        }
    }

    fn succeed(&self, slot: &mut JobSlot, epoch: u64, artifact: RawArtifact) {
        slot.stop();
        let len = artifact.len();
        let content_type = artifact
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string());
        let handle = self.artifacts.register(artifact);
        info!(epoch, bytes = len, handle = handle.uri(), "job succeeded");
        self.transition(JobState::Succeeded(JobResult {
            handle,
            len,
            content_type,
        }));
    }

    fn fail(&self, slot: &mut JobSlot, epoch: u64, err: JobError) {
        slot.stop();
        warn!(epoch, error = %err, "job failed");
        self.transition(JobState::Failed(ErrorInfo::from(err)));
    }
}
