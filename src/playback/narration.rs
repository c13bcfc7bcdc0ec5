//! Narration audio: duration probing and a clock-driven playback position.
//!
//! With the `cpal-audio` feature the narration is heard through the speaker
//! (see `playback::speaker`). [`ClockedNarration`] is the silent stand-in for
//! headless runs and tests: its position advances with a clock.

use crate::playback::decode::decode_narration;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<Instant>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Where a narration duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// Read from the WAV header.
    WavHeader,
    /// Counted from decoded frames.
    Decoded,
    /// Sent by the service alongside the audio.
    ServiceHint,
    /// Nothing usable; the duration is zero and playback is refused.
    Unknown,
}

/// Determine narration length in seconds.
///
/// Order: WAV header, decoded frame count, then the service hint.
pub fn measure_duration(audio: &[u8], hint: Option<f64>) -> (f64, DurationSource) {
    if let Some(seconds) = wav_duration(audio) {
        return (seconds, DurationSource::WavHeader);
    }
    if let Ok(decoded) = decode_narration(audio) {
        return (decoded.duration_seconds(), DurationSource::Decoded);
    }
    if let Some(seconds) = hint.filter(|s| s.is_finite() && *s > 0.0) {
        return (seconds, DurationSource::ServiceHint);
    }
    (0.0, DurationSource::Unknown)
}

fn wav_duration(audio: &[u8]) -> Option<f64> {
    let reader = hound::WavReader::new(Cursor::new(audio)).ok()?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(f64::from(reader.duration()) / f64::from(sample_rate))
}

/// Audio playback subsystem as seen by the player.
pub trait NarrationOutput {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Current position in seconds, within `[0, duration]`.
    fn position(&self) -> f64;
    fn duration(&self) -> f64;
    fn is_playing(&self) -> bool;
}

/// Narration whose position advances with a clock while playing.
pub struct ClockedNarration<C: Clock = SystemClock> {
    clock: C,
    duration: f64,
    offset: f64,
    started: Option<Instant>,
}

impl ClockedNarration<SystemClock> {
    pub fn new(duration: f64) -> Self {
        Self::with_clock(duration, SystemClock)
    }
}

impl<C: Clock> ClockedNarration<C> {
    pub fn with_clock(duration: f64, clock: C) -> Self {
        Self {
            clock,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            offset: 0.0,
            started: None,
        }
    }
}

impl<C: Clock> NarrationOutput for ClockedNarration<C> {
    fn play(&mut self) {
        if self.started.is_some() {
            return;
        }
        if self.offset >= self.duration {
            self.offset = 0.0;
        }
        self.started = Some(self.clock.now());
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started = None;
    }

    fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.offset = seconds.clamp(0.0, self.duration);
        if self.started.is_some() {
            self.started = Some(self.clock.now());
        }
    }

    fn position(&self) -> f64 {
        let running = self
            .started
            .map(|start| self.clock.now().saturating_duration_since(start).as_secs_f64())
            .unwrap_or(0.0);
        (self.offset + running).min(self.duration)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.started.is_some() && self.position() < self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::decode::tests::{silent_mp3, wav_bytes};
    use std::sync::Arc;

    #[test]
    fn test_wav_header_duration() {
        let audio = wav_bytes(3, 8000, 1);
        let (seconds, source) = measure_duration(&audio, Some(99.0));
        assert_eq!(source, DurationSource::WavHeader);
        assert!((seconds - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mp3_length_from_frames() {
        // ~80 kB at 128 kbit/s lasts about 5 seconds, whatever the hint says.
        let audio = silent_mp3(192);
        let (seconds, source) = measure_duration(&audio, None);
        assert_eq!(source, DurationSource::Decoded);
        assert!((seconds - 5.0).abs() < 0.1, "got {seconds}");

        let (seconds, source) = measure_duration(&audio, Some(20.0));
        assert_eq!(source, DurationSource::Decoded);
        assert!(seconds < 6.0);
    }

    #[test]
    fn test_hint_when_undecodable() {
        let (seconds, source) = measure_duration(b"ID3\x04\x00fake-mp3", Some(20.0));
        assert_eq!(source, DurationSource::ServiceHint);
        assert_eq!(seconds, 20.0);
    }

    #[test]
    fn test_unknown_without_hint() {
        let (seconds, source) = measure_duration(&[0u8; 4000], None);
        assert_eq!(source, DurationSource::Unknown);
        assert_eq!(seconds, 0.0);

        let (_, source) = measure_duration(&[0u8; 10], Some(f64::NAN));
        assert_eq!(source, DurationSource::Unknown);
    }

    #[test]
    fn test_clocked_narration_advances_while_playing() {
        let clock = Arc::new(MockClock::new());
        let mut narration = ClockedNarration::with_clock(20.0, Arc::clone(&clock));
        assert_eq!(narration.position(), 0.0);

        narration.play();
        clock.advance(Duration::from_secs(7));
        assert!((narration.position() - 7.0).abs() < 1e-9);
        assert!(narration.is_playing());

        narration.pause();
        clock.advance(Duration::from_secs(5));
        assert!((narration.position() - 7.0).abs() < 1e-9);
        assert!(!narration.is_playing());
    }

    #[test]
    fn test_clocked_narration_stops_at_end() {
        let clock = Arc::new(MockClock::new());
        let mut narration = ClockedNarration::with_clock(10.0, Arc::clone(&clock));
        narration.play();
        clock.advance(Duration::from_secs(15));
        assert_eq!(narration.position(), 10.0);
        assert!(!narration.is_playing());
    }

    #[test]
    fn test_clocked_narration_seek_while_playing() {
        let clock = Arc::new(MockClock::new());
        let mut narration = ClockedNarration::with_clock(30.0, Arc::clone(&clock));
        narration.play();
        clock.advance(Duration::from_secs(12));
        narration.seek(2.0);
        clock.advance(Duration::from_secs(1));
        assert!((narration.position() - 3.0).abs() < 1e-9);
        narration.seek(-5.0);
        assert_eq!(narration.position(), 0.0);
    }

    #[test]
    fn test_clocked_narration_replays_from_end() {
        let clock = Arc::new(MockClock::new());
        let mut narration = ClockedNarration::with_clock(4.0, Arc::clone(&clock));
        narration.play();
        clock.advance(Duration::from_secs(4));
        narration.pause();
        narration.play();
        assert_eq!(narration.position(), 0.0);
    }
}
