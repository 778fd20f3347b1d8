//! Composition planning module
//!
//! This module builds the single FFmpeg invocation for a render job:
//! - Numbered inputs (three clips, then the voiceover)
//! - Per-clip setpts speed scaling
//! - Video-only concatenation in clip order
//! - Subtitle burn-in inside the filter graph
//! - Stream mapping of the composited video and the voiceover audio

pub mod planner;

pub use planner::{CompositionPlan, SpeedPolicy};
