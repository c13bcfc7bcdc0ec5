//! Couples a narration output with the slide timeline.
//!
//! The narration is the only time source. Each [`Player::tick`] samples its
//! position and feeds it to the timeline.

use crate::playback::narration::{
    ClockedNarration, DurationSource, NarrationOutput, measure_duration,
};
use crate::playback::timeline::{Advance, Timeline, TimelineError};
use crate::service::types::{Slide, VideoAsset};

pub struct Player {
    timeline: Timeline,
    narration: Box<dyn NarrationOutput>,
    duration_source: DurationSource,
}

impl Player {
    /// Silent player for `asset` driven by the system clock.
    pub fn new(asset: &VideoAsset) -> Result<Self, TimelineError> {
        let (duration, source) = measure_duration(&asset.narration, asset.duration_hint);
        Self::with_narration(asset, Box::new(ClockedNarration::new(duration)), source)
    }

    /// Player for `asset` driven by a caller-supplied narration output.
    /// `source` records where the output's duration came from.
    pub fn with_narration(
        asset: &VideoAsset,
        narration: Box<dyn NarrationOutput>,
        source: DurationSource,
    ) -> Result<Self, TimelineError> {
        let timeline = Timeline::from_asset(asset, narration.duration())?;
        Ok(Self {
            timeline,
            narration,
            duration_source: source,
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn current_slide(&self) -> &Slide {
        self.timeline.current_slide()
    }

    pub fn duration_source(&self) -> DurationSource {
        self.duration_source
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.position().is_playing
    }

    /// Returns false when the narration length is unknown.
    pub fn play(&mut self) -> bool {
        if !self.timeline.play() {
            return false;
        }
        self.narration
            .seek(self.timeline.position().elapsed_seconds);
        self.narration.play();
        true
    }

    pub fn pause(&mut self) {
        self.narration.pause();
        self.timeline.pause();
        let elapsed = self.narration.position();
        self.timeline.update(elapsed);
    }

    pub fn toggle(&mut self) -> bool {
        if self.is_playing() {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    pub fn rewind(&mut self, seconds: f64) -> Advance {
        self.sync_from_narration();
        let advance = self.timeline.rewind(seconds);
        self.narration
            .seek(self.timeline.position().elapsed_seconds);
        advance
    }

    pub fn seek(&mut self, t: f64) -> Advance {
        let advance = self.timeline.seek(t);
        self.narration
            .seek(self.timeline.position().elapsed_seconds);
        advance
    }

    /// Sample the narration and advance the timeline.
    pub fn tick(&mut self) -> Advance {
        if !self.is_playing() {
            return Advance::default();
        }
        let advance = self.timeline.update(self.narration.position());
        if advance.completed {
            self.narration.pause();
        }
        advance
    }

    fn sync_from_narration(&mut self) {
        if self.is_playing() {
            self.tick();
        }
    }
}
