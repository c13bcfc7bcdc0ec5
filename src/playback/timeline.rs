//! Maps narration playback position to the slide on screen.
//!
//! The timeline never measures time itself. Whatever plays the narration
//! reports elapsed seconds through [`Timeline::update`], and the current
//! slide is a pure function of that position and the slide offsets.

use crate::service::types::{Slide, VideoAsset};
use thiserror::Error;

/// Slide list violates the ordering contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("slide list is empty")]
    NoSlides,

    #[error("slide {index} has an invalid start offset")]
    InvalidOffset { index: usize },

    #[error("first slide starts at {offset}s, expected 0")]
    FirstOffsetNotZero { offset: f64 },

    #[error("slide {index} starts at {offset}s, not after the previous slide at {previous}s")]
    OffsetNotIncreasing {
        index: usize,
        offset: f64,
        previous: f64,
    },
}

/// Check that slides are non-empty, start at 0 and have strictly increasing offsets.
pub fn check_slide_order(slides: &[Slide]) -> Result<(), TimelineError> {
    let first = slides.first().ok_or(TimelineError::NoSlides)?;
    for (index, slide) in slides.iter().enumerate() {
        let offset = slide.start_offset_seconds;
        if !offset.is_finite() || offset < 0.0 {
            return Err(TimelineError::InvalidOffset { index });
        }
    }
    if first.start_offset_seconds != 0.0 {
        return Err(TimelineError::FirstOffsetNotZero {
            offset: first.start_offset_seconds,
        });
    }
    for (index, pair) in slides.windows(2).enumerate() {
        let (previous, offset) = (pair[0].start_offset_seconds, pair[1].start_offset_seconds);
        if offset <= previous {
            return Err(TimelineError::OffsetNotIncreasing {
                index: index + 1,
                offset,
                previous,
            });
        }
    }
    Ok(())
}

/// Transport state of the narration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackPosition {
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
    pub is_playing: bool,
}

/// What an elapsed-time update changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Advance {
    pub slide_changed: bool,
    /// Playback reached the end on this update.
    pub completed: bool,
}

/// Slide timeline for one video asset.
#[derive(Debug, Clone)]
pub struct Timeline {
    slides: Vec<Slide>,
    position: PlaybackPosition,
}

impl Timeline {
    /// Create a paused timeline at 0.
    ///
    /// `total_seconds` is the narration duration; non-finite or negative
    /// values are treated as 0 until [`Timeline::set_duration`] is called.
    pub fn new(slides: Vec<Slide>, total_seconds: f64) -> Result<Self, TimelineError> {
        check_slide_order(&slides)?;
        Ok(Self {
            slides,
            position: PlaybackPosition {
                elapsed_seconds: 0.0,
                total_seconds: sanitize(total_seconds),
                is_playing: false,
            },
        })
    }

    pub fn from_asset(asset: &VideoAsset, total_seconds: f64) -> Result<Self, TimelineError> {
        Self::new(asset.slides.clone(), total_seconds)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    /// Index of the last slide starting at or before `t`.
    ///
    /// Times before the first slide (or NaN) resolve to the first slide.
    pub fn slide_index_at(&self, t: f64) -> usize {
        if t.is_nan() {
            return 0;
        }
        self.slides
            .partition_point(|slide| slide.start_offset_seconds <= t)
            .saturating_sub(1)
    }

    pub fn slide_at(&self, t: f64) -> &Slide {
        &self.slides[self.slide_index_at(t)]
    }

    pub fn current_index(&self) -> usize {
        self.slide_index_at(self.position.elapsed_seconds)
    }

    pub fn current_slide(&self) -> &Slide {
        self.slide_at(self.position.elapsed_seconds)
    }

    /// Fraction of the narration played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let PlaybackPosition {
            elapsed_seconds,
            total_seconds,
            ..
        } = self.position;
        if total_seconds <= 0.0 {
            0.0
        } else {
            (elapsed_seconds / total_seconds).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position.total_seconds > 0.0
            && self.position.elapsed_seconds >= self.position.total_seconds
    }

    /// Narration duration became known (or changed).
    pub fn set_duration(&mut self, total_seconds: f64) -> Advance {
        self.position.total_seconds = sanitize(total_seconds);
        let elapsed = self.position.elapsed_seconds;
        self.move_to(elapsed)
    }

    /// Elapsed-time update from the narration player.
    pub fn update(&mut self, elapsed_seconds: f64) -> Advance {
        if !elapsed_seconds.is_finite() {
            return Advance::default();
        }
        self.move_to(elapsed_seconds)
    }

    /// Start playing. Playing from the end starts over from 0.
    ///
    /// Returns false when there is nothing to play (unknown duration).
    pub fn play(&mut self) -> bool {
        if self.position.total_seconds <= 0.0 {
            return false;
        }
        if self.is_finished() {
            self.position.elapsed_seconds = 0.0;
        }
        self.position.is_playing = true;
        true
    }

    pub fn pause(&mut self) {
        self.position.is_playing = false;
    }

    /// Toggle play/pause; returns the new playing state.
    pub fn toggle(&mut self) -> bool {
        if self.position.is_playing {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    /// Jump back `seconds`, never before 0.
    pub fn rewind(&mut self, seconds: f64) -> Advance {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Advance::default();
        }
        let target = (self.position.elapsed_seconds - seconds).max(0.0);
        self.move_to(target)
    }

    /// Jump to `t`, clamped into `[0, D]`.
    pub fn seek(&mut self, t: f64) -> Advance {
        if !t.is_finite() {
            return Advance::default();
        }
        self.move_to(t)
    }

    fn move_to(&mut self, t: f64) -> Advance {
        let before = self.current_index();
        self.position.elapsed_seconds = t.clamp(0.0, self.position.total_seconds);

        let completed = self.position.is_playing && self.is_finished();
        if completed {
            self.position.is_playing = false;
        }

        Advance {
            slide_changed: self.current_index() != before,
            completed,
        }
    }
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
