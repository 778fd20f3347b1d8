//! SubRip track generation

use serde::Deserialize;
use std::fmt::Write;

use crate::error::{RenderError, Result};

/// One timed caption as supplied by the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptionEntry {
    /// Start time in seconds
    pub start: f64,
    /// Display duration in seconds
    pub duration: f64,
    /// Caption text
    pub text: String,
}

impl CaptionEntry {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Decode the raw `captions` payload.
///
/// Any entry with a missing or non-numeric field fails the whole list.
pub fn parse_captions(raw: serde_json::Value) -> Result<Vec<CaptionEntry>> {
    serde_json::from_value(raw).map_err(|e| RenderError::InvalidCaptions(e.to_string()))
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm).
///
/// Milliseconds are truncated, after rounding to whole microseconds to absorb
/// float error.
pub fn format_srt_timestamp(secs: f64) -> String {
    let total_us = (secs.max(0.0) * 1_000_000.0).round() as u64;
    let total_ms = total_us / 1000;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Render captions as an SRT document, one cue per entry numbered from 1.
pub fn generate_srt(captions: &[CaptionEntry]) -> String {
    let mut out = String::new();
    for (i, caption) in captions.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(caption.start),
            format_srt_timestamp(caption.end()),
            caption.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(65.25), "00:01:05,250");
        assert_eq!(format_srt_timestamp(3599.999), "00:59:59,999");
        assert_eq!(format_srt_timestamp(3600.0), "01:00:00,000");
        assert_eq!(format_srt_timestamp(36_000.5), "10:00:00,500");
        assert_eq!(format_srt_timestamp(1.001), "00:00:01,001");
    }

    #[test]
    fn test_format_timestamp_truncates_milliseconds() {
        assert_eq!(format_srt_timestamp(59.9999), "00:00:59,999");
        assert_eq!(format_srt_timestamp(2.0005), "00:00:02,000");
        assert_eq!(format_srt_timestamp(0.0019), "00:00:00,001");
    }

    #[test]
    fn test_format_timestamp_clamps_negative() {
        assert_eq!(format_srt_timestamp(-3.0), "00:00:00,000");
    }

    #[test]
    fn test_cue_example() {
        let srt = generate_srt(&[CaptionEntry::new(65.25, 2.5, "hi")]);
        assert_eq!(srt, "1\n00:01:05,250 --> 00:01:07,750\nhi\n\n");
    }

    #[test]
    fn test_cues_numbered_in_input_order() {
        // Out-of-order timing is kept as given
        let captions = vec![
            CaptionEntry::new(10.0, 1.0, "third by time"),
            CaptionEntry::new(0.0, 2.0, "first by time"),
            CaptionEntry::new(4.0, 1.5, "second by time"),
        ];
        let srt = generate_srt(&captions);
        let blocks: Vec<&str> = srt.trim_end().split("\n\n").collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0],
            "1\n00:00:10,000 --> 00:00:11,000\nthird by time"
        );
        assert_eq!(blocks[1], "2\n00:00:00,000 --> 00:00:02,000\nfirst by time");
        assert_eq!(
            blocks[2],
            "3\n00:00:04,000 --> 00:00:05,500\nsecond by time"
        );
    }

    #[test]
    fn test_zero_duration_cue() {
        let srt = generate_srt(&[CaptionEntry::new(1.5, 0.0, "flash")]);
        assert!(srt.contains("00:00:01,500 --> 00:00:01,500"));
    }

    #[test]
    fn test_timestamp_fields_in_range() {
        for &(start, duration) in &[(0.0, 0.1), (59.999, 0.002), (3725.4, 61.7), (7199.5, 0.5)] {
            let entry = CaptionEntry::new(start, duration, "x");
            let formatted = format_srt_timestamp(entry.end());
            let (hms, ms) = formatted.split_once(',').unwrap();
            assert_eq!(ms.len(), 3);

            let parts: Vec<&str> = hms.split(':').collect();
            assert_eq!(parts.len(), 3);
            assert!(parts.iter().all(|p| p.len() == 2));
            assert!(parts[1].parse::<u32>().unwrap() < 60);
            assert!(parts[2].parse::<u32>().unwrap() < 60);
        }
    }

    #[test]
    fn test_empty_caption_list() {
        assert_eq!(generate_srt(&[]), "");
    }

    #[test]
    fn test_parse_captions() {
        let captions = parse_captions(json!([
            { "start": 0, "duration": 2.5, "text": "Hello" },
            { "start": 2.5, "duration": 1, "text": "World" }
        ]))
        .unwrap();

        assert_eq!(captions.len(), 2);
        assert_eq!(captions[1], CaptionEntry::new(2.5, 1.0, "World"));
    }

    #[test]
    fn test_parse_captions_rejects_non_numeric() {
        let err = parse_captions(json!([{ "start": "soon", "duration": 1, "text": "x" }]))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidCaptions(_)));
    }
}
