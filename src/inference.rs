use crate::alert::{AlertSink, AlertState};
use crate::config::SessionConfig;
use crate::embedding::Embedder;
use crate::error::SessionError;
use crate::frame::FrameSource;
use crate::knn::ExampleStore;
use crate::label::{ClassificationResult, Label};
use crate::phase::Phase;
use crate::session::SessionContext;
use crate::TOUCHED_CONFIDENCE;
use log::{debug, error, info, trace};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// What the alerting policy did for one classification.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct AlertDecision {
    pub touched: bool,
    pub played: bool,
    pub notified: bool,
}

/// Totals reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct InferenceSummary {
    pub cycles: u64,
    pub touched_cycles: u64,
    pub sounds_played: u64,
}

impl InferenceSummary {
    fn record(&mut self, decision: AlertDecision) {
        self.cycles += 1;
        if decision.touched {
            self.touched_cycles += 1;
        }
        if decision.played {
            self.sounds_played += 1;
        }
    }
}

pub fn is_touch(result: &ClassificationResult) -> bool {
    result.label == Label::Touched && result.confidence(Label::Touched) > TOUCHED_CONFIDENCE
}

/// Applies one classification to the touched state and the alert sink.
///
/// A touch always notifies; the cue only plays when the cooldown is free, and
/// only the sink's finished callback frees it again.
pub fn apply_alert_policy<A: AlertSink>(
    result: &ClassificationResult,
    state: &AlertState,
    sink: &mut A,
    title: &str,
    body: &str,
) -> AlertDecision {
    if !is_touch(result) {
        trace!("not touched");
        state.set_touched(false);
        return AlertDecision::default();
    }

    debug!("touched, confidence {:.2}", result.confidence(Label::Touched));
    state.set_touched(true);
    let played = state.try_claim_sound();
    if played {
        sink.play();
    }
    sink.notify(title, body);
    AlertDecision {
        touched: true,
        played,
        notified: true,
    }
}

async fn classify_once<F, E, S>(
    frames: &mut F,
    embedder: &mut E,
    store: &S,
    stop: &CancellationToken,
) -> Result<Option<ClassificationResult>, SessionError>
where
    F: FrameSource,
    E: Embedder,
    S: ExampleStore,
{
    let frame = frames.current_frame()?;
    let embedding = embedder.infer(&frame)?;
    tokio::task::yield_now().await;
    if stop.is_cancelled() {
        debug!("Stop requested during extraction, discarding embedding");
        return Ok(None);
    }
    store.predict_class(&embedding).map(Some)
}

/// Classifies the current frame every `inference_delay` until `stop` fires or a
/// cycle fails. Cycles never overlap.
pub(crate) async fn run_loop<F, E, S, A>(
    ctx: &SessionContext,
    config: &SessionConfig,
    frames: &mut F,
    embedder: &mut E,
    store: &S,
    sink: &mut A,
    stop: &CancellationToken,
) -> Result<InferenceSummary, SessionError>
where
    F: FrameSource,
    E: Embedder,
    S: ExampleStore,
    A: AlertSink,
{
    ctx.phase.require(Phase::RunningInference)?;
    let delay = config.inference_delay();
    let mut summary = InferenceSummary::default();
    info!("Inference running every {:?}", delay);

    while !stop.is_cancelled() {
        let result = match classify_once(frames, embedder, store, stop).await {
            Ok(Some(result)) => result,
            Ok(None) => break,
            Err(e) => {
                error!("Inference stopped after {} cycles: {}", summary.cycles, e);
                return Err(e);
            }
        };
        let decision = apply_alert_policy(
            &result,
            &ctx.alerts,
            sink,
            &config.notification_title,
            &config.notification_body,
        );
        summary.record(decision);

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = sleep(delay) => {}
        }
    }

    info!("Inference stopped {:?}", summary);
    Ok(summary)
}
