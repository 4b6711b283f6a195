use crate::config::SessionConfig;
use crate::embedding::Embedder;
use crate::error::SessionError;
use crate::frame::FrameSource;
use crate::knn::ExampleStore;
use crate::label::Label;
use crate::phase::Phase;
use crate::session::SessionContext;
use log::{debug, info, warn};
use tokio::time::sleep;

/// Emitted after every stored training sample.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TrainingProgress {
    pub label: Label,
    /// 0-based index of the sample just stored.
    pub sample: usize,
    pub total: usize,
    pub percent: u8,
}

/// `floor((index + 1) / total * 100)`, in integers.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    ((index + 1) * 100 / total.max(1)).min(100) as u8
}

/// Captures one batch of `label` examples, then advances the phase.
///
/// Samples run strictly one after another: frame, embedding, store, delay.
/// A failure abandons the rest of the batch; stored examples stay.
pub(crate) async fn collect_examples<F, E, S>(
    ctx: &mut SessionContext,
    config: &SessionConfig,
    label: Label,
    frames: &mut F,
    embedder: &mut E,
    store: &mut S,
) -> Result<Phase, SessionError>
where
    F: FrameSource,
    E: Embedder,
    S: ExampleStore,
{
    ctx.phase.require(Phase::training_phase_for(label))?;
    let total = config.training_times;
    let delay = config.training_delay();
    info!("Training {} with {} samples", label, total);

    for sample in 0..total {
        let embedding = match frames.current_frame().and_then(|frame| embedder.infer(&frame)) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Training {} abandoned after {} of {} samples: {}", label, sample, total, e);
                return Err(e);
            }
        };
        store.add_example(embedding, label);

        let progress = TrainingProgress {
            label,
            sample,
            total,
            percent: progress_percent(sample, total),
        };
        debug!("process {}%", progress.percent);
        let _ = ctx.progress.send(progress);

        sleep(delay).await;
    }

    info!("Training {} done, store holds {} examples", label, store.len());
    ctx.phase.advance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knn::KnnStore;
    use crate::tests::{ColourEmbedder, ScriptedFrames, HANDS_DOWN, HAND_ON_FACE};

    fn context_in(phase: Phase) -> SessionContext {
        let mut ctx = SessionContext::default();
        while ctx.phase() != phase {
            ctx.phase.advance().unwrap();
        }
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn batch_refuses_to_run_while_awaiting() {
        let mut ctx = context_in(Phase::AwaitingTrainNegative);
        let mut frames = ScriptedFrames::new(HANDS_DOWN);
        let mut embedder = ColourEmbedder::default();
        let mut store = KnnStore::default();
        let result = collect_examples(
            &mut ctx,
            &SessionConfig::default(),
            Label::NotTouched,
            &mut frames,
            &mut embedder,
            &mut store,
        )
        .await;
        assert!(matches!(
            result,
            Err(SessionError::PhaseMismatch {
                expected: Phase::TrainingNegative,
                actual: Phase::AwaitingTrainNegative
            })
        ));
        assert_eq!(frames.served, 0);
        assert_eq!(embedder.calls, 0);
        assert!(store.is_empty());
        assert_eq!(ctx.phase(), Phase::AwaitingTrainNegative);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_refuses_label_of_the_other_phase() {
        let mut ctx = context_in(Phase::TrainingNegative);
        let mut progress = ctx.progress.subscribe();
        let mut frames = ScriptedFrames::new(HAND_ON_FACE);
        let mut embedder = ColourEmbedder::default();
        let mut store = KnnStore::default();
        let result = collect_examples(
            &mut ctx,
            &SessionConfig::default(),
            Label::Touched,
            &mut frames,
            &mut embedder,
            &mut store,
        )
        .await;
        assert!(matches!(
            result,
            Err(SessionError::PhaseMismatch {
                expected: Phase::TrainingPositive,
                actual: Phase::TrainingNegative
            })
        ));
        assert_eq!(frames.served, 0);
        assert_eq!(store.count(Label::Touched), 0);
        assert!(store.is_empty());
        assert!(progress.try_recv().is_err());
        assert_eq!(ctx.phase(), Phase::TrainingNegative);
    }

    #[test]
    fn progress_is_floored_percentage() {
        assert_eq!(progress_percent(0, 50), 2);
        assert_eq!(progress_percent(24, 50), 50);
        assert_eq!(progress_percent(49, 50), 100);
        assert_eq!(progress_percent(0, 3), 33);
        assert_eq!(progress_percent(1, 3), 66);
        assert_eq!(progress_percent(2, 3), 100);
    }
}
