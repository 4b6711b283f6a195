use crate::alert::{AlertSink, AlertState};
use crate::config::SessionConfig;
use crate::embedding::Embedder;
use crate::error::SessionError;
use crate::frame::FrameSource;
use crate::inference::{self, InferenceSummary};
use crate::knn::ExampleStore;
use crate::label::Label;
use crate::phase::{Phase, PhaseMachine};
use crate::training::{self, TrainingProgress};
use crate::PROGRESS_CHANNEL_SIZE;
use log::{debug, error, info};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Mutable state of one session, handed to the training controller and the
/// inference loop by reference.
#[derive(Debug)]
pub struct SessionContext {
    pub(crate) phase: PhaseMachine,
    pub(crate) alerts: AlertState,
    pub(crate) progress: broadcast::Sender<TrainingProgress>,
}

impl Default for SessionContext {
    fn default() -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        SessionContext {
            phase: PhaseMachine::default(),
            alerts: AlertState::default(),
            progress,
        }
    }
}

impl SessionContext {
    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    pub fn alerts(&self) -> &AlertState {
        &self.alerts
    }
}

/// One training + inference run over a frame source.
///
/// User events (`begin_negative_training`, `begin_positive_training`,
/// `run_inference`) are ignored unless the session is in the matching phase.
/// Once inference has run there is no way back to training; build a new
/// session instead.
pub struct Session<F, E, S, A> {
    config: SessionConfig,
    context: SessionContext,
    frames: F,
    embedder: E,
    store: S,
    alerts: A,
    inference_started: bool,
}

impl<F, E, S, A> Session<F, E, S, A>
where
    F: FrameSource,
    E: Embedder,
    S: ExampleStore,
    A: AlertSink,
{
    pub fn new(config: SessionConfig, frames: F, embedder: E, store: S, mut alerts: A) -> Self {
        let context = SessionContext::default();
        alerts.on_finished(context.alerts.release_on_finish());
        Session {
            config,
            context,
            frames,
            embedder,
            store,
            alerts,
            inference_started: false,
        }
    }

    /// Acquires the frame source, loads the embedder and moves to
    /// `AwaitingTrainNegative`. The store must be empty so that it only ever
    /// holds examples captured by this session's training phases. Failures
    /// leave the session in `Initializing`.
    pub fn start(&mut self) -> Result<Phase, SessionError> {
        self.context.phase.require(Phase::Initializing)?;
        info!("Starting session");
        let ready = if self.store.is_empty() {
            self.frames.acquire().and_then(|_| self.embedder.load())
        } else {
            Err(SessionError::StoreNotEmpty(self.store.len()))
        };
        if let Err(e) = ready {
            error!("Session start failed: {}", e);
            return Err(e);
        }
        info!("Setup done; keep hands away from the face and begin negative training");
        self.context.phase.advance()
    }

    /// Returns `false` (and does nothing) unless the session awaits negative training.
    pub async fn begin_negative_training(&mut self) -> Result<bool, SessionError> {
        self.begin_training(Phase::AwaitingTrainNegative, Label::NotTouched).await
    }

    /// Returns `false` (and does nothing) unless the session awaits positive training.
    pub async fn begin_positive_training(&mut self) -> Result<bool, SessionError> {
        self.begin_training(Phase::AwaitingTrainPositive, Label::Touched).await
    }

    async fn begin_training(&mut self, awaiting: Phase, label: Label) -> Result<bool, SessionError> {
        if !self.context.phase.advance_from(awaiting)? {
            debug!("Ignoring {} training request in phase {:?}", label, self.phase());
            return Ok(false);
        }
        training::collect_examples(
            &mut self.context,
            &self.config,
            label,
            &mut self.frames,
            &mut self.embedder,
            &mut self.store,
        )
        .await?;
        Ok(true)
    }

    /// Runs the inference loop until `stop` is cancelled or a cycle fails.
    ///
    /// Returns `None` without running when training is unfinished or the loop
    /// already ran once.
    pub async fn run_inference(&mut self, stop: CancellationToken) -> Result<Option<InferenceSummary>, SessionError> {
        if self.phase() != Phase::RunningInference || self.inference_started {
            debug!("Ignoring inference request in phase {:?}", self.phase());
            return Ok(None);
        }
        self.inference_started = true;
        inference::run_loop(
            &self.context,
            &self.config,
            &mut self.frames,
            &mut self.embedder,
            &self.store,
            &mut self.alerts,
            &stop,
        )
        .await
        .map(Some)
    }

    pub fn phase(&self) -> Phase {
        self.context.phase()
    }

    pub fn is_touched(&self) -> bool {
        self.context.alerts.is_touched()
    }

    pub fn subscribe_touched(&self) -> watch::Receiver<bool> {
        self.context.alerts.subscribe_touched()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<TrainingProgress> {
        self.context.progress.subscribe()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn alerts(&self) -> &A {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut A {
        &mut self.alerts
    }

    /// Lets callers repoint a replay source between phases.
    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    #[cfg(test)]
    pub(crate) fn store_mut_for_tests(&mut self) -> &mut S {
        &mut self.store
    }

    #[cfg(test)]
    pub(crate) fn embedder_mut_for_tests(&mut self) -> &mut E {
        &mut self.embedder
    }
}
