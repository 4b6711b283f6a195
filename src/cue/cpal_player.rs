use crate::cue::{AlertCue, CuePlayer, PlaybackDone};
use crate::error::CueError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Tail added after the cue so the device drains its buffer before the stream drops.
const DRAIN_MS: u64 = 50;

/// Plays cues on the default output device. Each cue gets its own thread that
/// owns the stream for the cue's length.
#[derive(Debug, Default)]
pub struct CpalCuePlayer;

fn build_stream(cue: Arc<AlertCue>) -> Result<Stream, CueError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CueError::Playback("No output device available".into()))?;
    let supported = device.default_output_config().map_err(|e| CueError::Playback(e.to_string()))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(CueError::Playback(format!("Unsupported sample format {:?}", supported.sample_format())));
    }
    let config: cpal::StreamConfig = supported.into();
    debug!("Output config {:?}", config);

    let out_channels = config.channels as usize;
    let out_rate = config.sample_rate.0 as usize;
    let cue_rate = cue.sample_rate as usize;
    let cue_channels = cue.channels as usize;
    let cue_frames = cue.frames();
    let position = Arc::new(AtomicUsize::new(0));

    let err_fn = |err| warn!("An error occurred on the output stream: {}", err);
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(out_channels) {
                    let out_index = position.fetch_add(1, Ordering::Relaxed);
                    // nearest-sample rate conversion
                    let cue_index = out_index * cue_rate / out_rate.max(1);
                    for (channel, sample) in frame.iter_mut().enumerate() {
                        *sample = if cue_index < cue_frames {
                            cue.samples[cue_index * cue_channels + channel.min(cue_channels - 1)]
                        } else {
                            0.0
                        };
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| CueError::Playback(e.to_string()))
}

impl CuePlayer for CpalCuePlayer {
    fn play(&mut self, cue: Arc<AlertCue>, done: PlaybackDone) -> Result<(), CueError> {
        let length = cue.duration() + Duration::from_millis(DRAIN_MS);
        thread::Builder::new()
            .name("alert-cue".into())
            .spawn(move || {
                match build_stream(cue) {
                    Ok(stream) => match stream.play() {
                        Ok(()) => {
                            info!("Playing alert cue");
                            thread::sleep(length);
                        }
                        Err(e) => warn!("Alert cue playback error {:?}", e),
                    },
                    Err(e) => warn!("Alert cue stream error {}", e),
                }
                done();
            })
            .map(|_| ())
            .map_err(|e| CueError::Playback(e.to_string()))
    }
}
