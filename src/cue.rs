use crate::error::CueError;
use hound::{SampleFormat, WavReader};
use log::{debug, info, warn};
use rust_embed::Embed;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "playback")]
pub mod cpal_player;

pub const BUNDLED_CUE: &str = "alert.wav";

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

/// Called exactly once when a cue stops playing, whether it finished or failed.
pub type PlaybackDone = Box<dyn FnOnce() + Send + 'static>;

/// Decoded alert sound, interleaved f32 samples in [-1, 1].
#[derive(Debug, Clone)]
pub struct AlertCue {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AlertCue {
    pub fn bundled() -> Result<AlertCue, CueError> {
        let file = Assets::get(BUNDLED_CUE).ok_or(CueError::MissingAsset(BUNDLED_CUE))?;
        AlertCue::from_reader(WavReader::new(Cursor::new(file.data.as_ref()))?)
    }

    pub fn from_file(path: &Path) -> Result<AlertCue, CueError> {
        info!("Reading alert cue {:?}", path);
        AlertCue::from_reader(WavReader::open(path)?)
    }

    fn from_reader<R: Read>(mut reader: WavReader<R>) -> Result<AlertCue, CueError> {
        let spec = reader.spec();
        let samples = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<f32>, _>>()?
            }
        };
        if samples.is_empty() {
            return Err(CueError::Empty);
        }
        let cue = AlertCue {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels.max(1),
        };
        debug!("Alert cue {:?} long, {} Hz, {} channels", cue.duration(), cue.sample_rate, cue.channels);
        Ok(cue)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }
}

/// Plays a cue without blocking the caller and reports when it is done.
pub trait CuePlayer {
    fn play(&mut self, cue: Arc<AlertCue>, done: PlaybackDone) -> Result<(), CueError>;
}

/// Headless player: produces no sound, only waits out the cue length on a
/// background thread before reporting completion.
#[derive(Debug, Default)]
pub struct TimedCuePlayer;

impl CuePlayer for TimedCuePlayer {
    fn play(&mut self, cue: Arc<AlertCue>, done: PlaybackDone) -> Result<(), CueError> {
        let length = cue.duration();
        thread::Builder::new()
            .name("alert-cue".into())
            .spawn(move || {
                thread::sleep(length);
                done();
            })
            .map(|_| ())
            .map_err(|e| {
                warn!("Can't start cue thread {}", e);
                CueError::Playback(e.to_string())
            })
    }
}
