//! Narration decoding to mono PCM.
//!
//! The service sends MP3; locally produced narration is usually WAV. Both go
//! through symphonia so the frame count, not the byte length, decides how
//! long the narration runs.

use crate::error::{AdvisorError, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded narration, downmixed to one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNarration {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedNarration {
    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

fn decode_error(message: impl Into<String>) -> AdvisorError {
    AdvisorError::Playback {
        message: message.into(),
    }
}

/// Decode `audio` and downmix it to mono.
///
/// Fails when the container is unrecognized or no frame decodes.
pub fn decode_narration(audio: &[u8]) -> Result<DecodedNarration> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(audio.to_vec())), Default::default());

    let mut hint = Hint::new();
    if audio.starts_with(b"RIFF") {
        hint.with_extension("wav");
    } else {
        hint.with_extension("mp3");
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(format!("unrecognized narration audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| decode_error("narration has no audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| decode_error("narration sample rate is unknown"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(format!("no decoder for narration: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(decode_error(format!("narration read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_error(format!("narration decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let frames = decoded.frames() as u64;
        let required = usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(channels);
        if sample_buf.as_ref().is_none_or(|buf| buf.capacity() < required) {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        } else if let Some(buf) = sample_buf.as_mut() {
            buf.clear();
        }

        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        let data = buf.samples();
        if channels == 1 {
            samples.extend_from_slice(data);
        } else {
            samples.extend(
                data.chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    if samples.is_empty() {
        return Err(decode_error("narration contains no audio frames"));
    }
    Ok(DecodedNarration {
        samples,
        sample_rate,
    })
}

/// Linear resampling of a mono signal.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let out_len = ((input.len() as f64) * ratio).round() as usize;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = i as f64 / ratio;
            let i0 = (src.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let t = (src - i0 as f64) as f32;
            input[i0] * (1.0 - t) + input[i1] * t
        })
        .collect()
}
