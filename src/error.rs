use crate::phase::Phase;
use std::path::PathBuf;

/// Everything that can stop a session, a training batch or an inference cycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No usable frame source on this host.
    #[error("Frame source unavailable: {0}")]
    DeviceUnavailable(String),
    /// The user (or the OS) refused access to the frame source.
    #[error("Frame source access denied: {0}")]
    PermissionDenied(String),
    #[error("Embedding model failed to load: {0}")]
    ModelLoad(String),
    /// A frame could not be read after the source was acquired.
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),
    #[error("Embedding extraction failed: {0}")]
    EmbeddingExtraction(String),
    /// Classification was attempted against an empty example store.
    #[error("Classifier has no examples to compare against")]
    ClassifierPrecondition,
    /// The session was handed a store that already holds examples.
    #[error("Example store must start empty, found {0} examples")]
    StoreNotEmpty(usize),
    #[error("Operation requires phase {expected:?}, session is in {actual:?}")]
    PhaseMismatch { expected: Phase, actual: Phase },
    #[error("No transition out of phase {0:?}")]
    InvalidTransition(Phase),
}

impl SessionError {
    /// Failures that leave the session unable to train or classify at all.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            SessionError::DeviceUnavailable(_)
                | SessionError::PermissionDenied(_)
                | SessionError::ModelLoad(_)
                | SessionError::StoreNotEmpty(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CueError {
    #[error("Bundled alert cue {0} is missing")]
    MissingAsset(&'static str),
    #[error("Failed to decode alert cue: {0}")]
    Decode(#[from] hound::Error),
    #[error("Alert cue contains no samples")]
    Empty,
    #[error("Audio playback failed: {0}")]
    Playback(String),
}
