//! Narrated slide playback.

pub mod decode;
pub mod narration;
pub mod player;
#[cfg(feature = "cpal-audio")]
pub mod speaker;
pub mod timeline;

pub use decode::{DecodedNarration, decode_narration};
pub use narration::{ClockedNarration, DurationSource, NarrationOutput, measure_duration};
pub use player::Player;
#[cfg(feature = "cpal-audio")]
pub use speaker::SpeakerNarration;
pub use timeline::{Advance, PlaybackPosition, Timeline, TimelineError};
