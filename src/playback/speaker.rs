//! Narration through the default output device via cpal.

use crate::error::{AdvisorError, Result};
use crate::playback::decode::{DecodedNarration, resample_linear};
use crate::playback::narration::NarrationOutput;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard};

/// Samples at the device rate plus the playhead the callback advances.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    playing: bool,
}

impl PlaybackBuffer {
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels) {
            let sample = if self.playing && self.position < self.samples.len() {
                let sample = self.samples[self.position];
                self.position += 1;
                sample
            } else {
                self.playing = false;
                0.0
            };
            frame.fill(sample);
        }
    }
}

/// Narration heard through the speaker. The stream runs for the lifetime of
/// this value and plays silence while paused.
pub struct SpeakerNarration {
    buffer: Arc<Mutex<PlaybackBuffer>>,
    sample_rate: u32,
    duration: f64,
    _stream: cpal::Stream,
}

fn audio_error(message: impl Into<String>) -> AdvisorError {
    AdvisorError::Playback {
        message: message.into(),
    }
}

impl SpeakerNarration {
    /// Open the default output device and queue `narration`, paused.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available or the stream
    /// cannot be started.
    pub fn open(narration: &DecodedNarration) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| audio_error("no default output device"))?;
        let supported = device
            .default_output_config()
            .map_err(|e| audio_error(format!("cannot query output device: {e}")))?;

        let sample_rate = supported.sample_rate();
        let channels = supported.channels().max(1);
        let stream_config = StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: resample_linear(&narration.samples, narration.sample_rate, sample_rate),
            position: 0,
            playing: false,
        }));
        let callback_buffer = Arc::clone(&buffer);
        let frame_width = usize::from(channels);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    match callback_buffer.lock() {
                        Ok(mut buf) => buf.fill(data, frame_width),
                        Err(_) => data.fill(0.0),
                    }
                },
                |err| eprintln!("advisor: audio output error: {err}"),
                None,
            )
            .map_err(|e| audio_error(format!("cannot open output stream: {e}")))?;
        stream
            .play()
            .map_err(|e| audio_error(format!("cannot start output stream: {e}")))?;

        Ok(Self {
            buffer,
            sample_rate,
            duration: narration.duration_seconds(),
            _stream: stream,
        })
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackBuffer> {
        match self.buffer.lock() {
            Ok(buf) => buf,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NarrationOutput for SpeakerNarration {
    fn play(&mut self) {
        let mut buf = self.lock();
        if buf.position >= buf.samples.len() {
            buf.position = 0;
        }
        buf.playing = true;
    }

    fn pause(&mut self) {
        self.lock().playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let seconds = seconds.clamp(0.0, self.duration);
        let mut buf = self.lock();
        let frame = (seconds * f64::from(self.sample_rate)).round() as usize;
        buf.position = frame.min(buf.samples.len());
    }

    fn position(&self) -> f64 {
        let frame = self.lock().position;
        (frame as f64 / f64::from(self.sample_rate)).min(self.duration)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        let buf = self.lock();
        buf.playing && buf.position < buf.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_fills_every_channel() {
        let mut buf = PlaybackBuffer {
            samples: vec![0.25, 0.5, 0.75],
            position: 0,
            playing: true,
        };
        let mut data = [9.0f32; 4];
        buf.fill(&mut data, 2);
        assert_eq!(data, [0.25, 0.25, 0.5, 0.5]);
        assert_eq!(buf.position, 2);
    }

    #[test]
    fn test_buffer_stops_at_end() {
        let mut buf = PlaybackBuffer {
            samples: vec![0.5],
            position: 0,
            playing: true,
        };
        let mut data = [9.0f32; 3];
        buf.fill(&mut data, 1);
        assert_eq!(data, [0.5, 0.0, 0.0]);
        assert!(!buf.playing);
    }

    #[test]
    fn test_paused_buffer_is_silent() {
        let mut buf = PlaybackBuffer {
            samples: vec![0.5, 0.5],
            position: 0,
            playing: false,
        };
        let mut data = [9.0f32; 2];
        buf.fill(&mut data, 1);
        assert_eq!(data, [0.0, 0.0]);
        assert_eq!(buf.position, 0);
    }
}
