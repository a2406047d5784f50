//! Audio sink contract and the cpal-backed output device.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Playback contract the alarm controller drives.
///
/// `play` blocks until the waveform has finished or failed; completion is
/// the return itself, so callers need no handle to poll.
pub trait AudioSink: Send + Sync {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), PlaybackError>;
}

/// Sink that accepts and discards playback. Used when audio is disabled;
/// the alarm state machine still runs against it.
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _samples: &[f32], _sample_rate: u32) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// Output through the default cpal device.
///
/// The stream is built fresh per `play` call. A beep is short and rare
/// enough that device setup cost does not matter, and holding no stream
/// between calls means a device that disappears only fails the next play.
pub struct CpalSink;

impl AudioSink for CpalSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), PlaybackError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(PlaybackError::UnsupportedFormat(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        let config = supported.config();
        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;

        let source: Arc<Vec<f32>> = Arc::new(samples.to_vec());
        let (done_tx, done_rx) = mpsc::channel::<()>();

        // Position advances in source samples per output frame; linear
        // interpolation bridges a device rate different from the tone's.
        let step = f64::from(sample_rate) / f64::from(device_rate);
        let feed = Arc::clone(&source);
        let mut pos = 0f64;
        let mut finished = false;

        let stream = device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in out.chunks_mut(channels) {
                        let idx = pos as usize;
                        let value = if idx + 1 < feed.len() {
                            let frac = (pos - idx as f64) as f32;
                            feed[idx] * (1.0 - frac) + feed[idx + 1] * frac
                        } else if idx < feed.len() {
                            feed[idx]
                        } else {
                            if !finished {
                                finished = true;
                                let _ = done_tx.send(());
                            }
                            0.0
                        };
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                        pos += step;
                    }
                },
                |e| tracing::warn!(error = %e, "audio output stream error"),
                None,
            )
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;

        stream.play().map_err(|e| PlaybackError::Backend(e.to_string()))?;

        // Wait for the callback to drain the tone. Cap at twice the tone
        // length plus slack so a stalled backend cannot wedge the caller.
        let tone_len = Duration::from_secs_f64(source.len() as f64 / f64::from(sample_rate));
        let deadline = tone_len * 2 + Duration::from_millis(250);
        done_rx
            .recv_timeout(deadline)
            .map_err(|_| PlaybackError::Backend("output stream stalled".into()))?;
        Ok(())
    }
}
