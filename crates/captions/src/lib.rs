//! VideoStove Captions
//!
//! Caption handling from transcript to subtitle file:
//! - **Transcript:** Load externally produced transcription segments
//! - **Alignment:** Map segments onto the final clock and lay out captions
//! - **Subtitle Generation:** SRT/VTT/karaoke ASS output from aligned captions

pub mod align;
pub mod subtitles;
pub mod transcript;

pub use align::align_captions;
pub use subtitles::*;
pub use transcript::*;
