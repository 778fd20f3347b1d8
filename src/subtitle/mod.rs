//! Subtitle generation module
//!
//! Turns the caption list of a render request into a SubRip (SRT) track:
//! - Caption entry decoding from the request payload
//! - `HH:MM:SS,mmm` timestamp formatting
//! - Cue numbering in input order

pub mod srt;

pub use srt::{generate_srt, parse_captions, CaptionEntry};
