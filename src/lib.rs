use crate::alert::CueAlertSink;
use crate::config::SessionConfig;
use crate::error::CueError;

pub mod alert;
pub mod config;
pub mod cue;
pub mod embedding;
pub mod error;
pub mod frame;
pub mod inference;
pub mod knn;
pub mod label;
pub mod logging;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod phase;
pub mod session;
pub mod training;


pub use error::SessionError;
pub use label::{ClassificationResult, Label};
pub use phase::Phase;
pub use session::Session;

pub const TRAINING_TIMES: usize = 50;
pub const TRAINING_DELAY_MS: u64 = 100;
pub const INFERENCE_DELAY_MS: u64 = 200;
pub const TOUCHED_CONFIDENCE: f32 = 0.8; // strictly above this counts as a touch
pub const KNN_K: usize = 3;
pub const NOTIFICATION_COOLDOWN_MS: u64 = 3_000;

pub(crate) const PROGRESS_CHANNEL_SIZE: usize = 128;

#[cfg(feature = "playback")]
pub type DefaultCuePlayer = cue::cpal_player::CpalCuePlayer;
#[cfg(not(feature = "playback"))]
pub type DefaultCuePlayer = cue::TimedCuePlayer;

/// Alert sink with the configured cue, playing on the speaker when the
/// `playback` feature is on and silently otherwise.
pub fn default_alert_sink(config: &SessionConfig) -> Result<CueAlertSink<DefaultCuePlayer>, CueError> {
    CueAlertSink::from_config(config, DefaultCuePlayer::default())
}
