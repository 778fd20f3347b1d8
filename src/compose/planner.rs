//! Composition planner - builds the FFmpeg argument list for a render job

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_SPEED_FACTORS;
use crate::workspace::Workspace;

/// Label of the final video stream in the filter graph
const OUTPUT_VIDEO_LABEL: &str = "outv";

/// Input index of the voiceover track
const VOICEOVER_INPUT: usize = 3;

/// setpts multipliers applied to clips 1, 2 and 3.
///
/// A factor above 1.0 slows the clip down (1.5 plays it at two thirds speed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPolicy {
    pub factors: [f64; 3],
}

impl SpeedPolicy {
    pub fn new(factors: [f64; 3]) -> Self {
        Self { factors }
    }
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_FACTORS)
    }
}

/// A fully resolved FFmpeg invocation
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    /// Inputs in index order: clip 1, clip 2, clip 3, voiceover
    pub inputs: [PathBuf; 4],
    /// Subtitle track burned into the output
    pub subtitles: PathBuf,
    /// Output container path
    pub output: PathBuf,
    /// Speed multipliers for the three clips
    pub speed: SpeedPolicy,
}

impl CompositionPlan {
    /// Plan the composition of a workspace's files
    pub fn new(workspace: &Workspace, speed: SpeedPolicy) -> Self {
        let [v1, v2, v3] = workspace.videos.clone();
        Self {
            inputs: [v1, v2, v3, workspace.voiceover.clone()],
            subtitles: workspace.subtitles.clone(),
            output: workspace.output.clone(),
            speed,
        }
    }

    /// Build the `-filter_complex` expression.
    ///
    /// `[0:v]setpts=1.5*PTS[v0];...;[v0][v1][v2]concat=n=3:v=1:a=0[cat];[cat]subtitles=filename='...'[outv]`
    pub fn filter_graph(&self) -> String {
        let mut chains: Vec<String> = self
            .speed
            .factors
            .iter()
            .enumerate()
            .map(|(i, factor)| format!("[{i}:v]setpts={factor}*PTS[v{i}]"))
            .collect();

        chains.push("[v0][v1][v2]concat=n=3:v=1:a=0[cat]".to_string());
        chains.push(format!(
            "[cat]subtitles=filename={}[{}]",
            escape_filter_value(&self.subtitles),
            OUTPUT_VIDEO_LABEL
        ));
        chains.join(";")
    }

    /// Build the argument vector passed to the engine binary.
    ///
    /// Paths are separate arguments; nothing here goes through a shell.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
        ];

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(self.filter_graph());

        args.push("-map".to_string());
        args.push(format!("[{}]", OUTPUT_VIDEO_LABEL));
        args.push("-map".to_string());
        args.push(format!("{}:a", VOICEOVER_INPUT));

        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Quote a path for use as a filter option value inside a filter graph.
///
/// FFmpeg unescapes twice: once when splitting the graph and once when
/// parsing the filter's options. The value is escaped for the option level
/// (`\`, `'` and `:`), then single-quoted for the graph level.
pub fn escape_filter_value(path: &Path) -> String {
    let raw = path.to_string_lossy();

    let mut option_level = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    format!("'{}'", option_level.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        Workspace::layout("job".to_string(), PathBuf::from("/work/job"))
    }

    #[test]
    fn test_filter_graph() {
        let plan = CompositionPlan::new(&workspace(), SpeedPolicy::default());
        assert_eq!(
            plan.filter_graph(),
            "[0:v]setpts=1.5*PTS[v0];[1:v]setpts=1.5*PTS[v1];[2:v]setpts=2*PTS[v2];\
             [v0][v1][v2]concat=n=3:v=1:a=0[cat];\
             [cat]subtitles=filename='/work/job/subtitles.srt'[outv]"
        );
    }

    #[test]
    fn test_args_layout() {
        let plan = CompositionPlan::new(&workspace(), SpeedPolicy::default());
        let args = plan.args();

        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == "-i")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(
            inputs,
            vec![
                "/work/job/v1.mp4",
                "/work/job/v2.mp4",
                "/work/job/v3.mp4",
                "/work/job/voiceover.mp3"
            ]
        );

        let maps: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == "-map")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(maps, vec!["[outv]", "3:a"]);

        assert_eq!(args.iter().filter(|a| *a == "-filter_complex").count(), 1);
        assert!(!args.iter().any(|a| a == "-vf"));
        assert_eq!(args.last().unwrap(), "/work/job/final.mp4");
    }

    #[test]
    fn test_filter_graph_structure() {
        let plan = CompositionPlan::new(&workspace(), SpeedPolicy::default());
        let graph = plan.filter_graph();

        assert_eq!(graph.matches("setpts=").count(), 3);
        assert_eq!(graph.matches("concat=n=3:v=1:a=0").count(), 1);
        assert!(graph.find("[0:v]setpts=1.5").unwrap() < graph.find("[1:v]setpts=1.5").unwrap());
        assert!(graph.contains("[2:v]setpts=2*PTS"));
        assert!(graph.contains("subtitles=filename='/work/job/subtitles.srt'"));
    }

    #[test]
    fn test_custom_speed_policy() {
        let plan = CompositionPlan::new(&workspace(), SpeedPolicy::new([1.0, 0.5, 1.25]));
        let graph = plan.filter_graph();
        assert!(graph.starts_with("[0:v]setpts=1*PTS[v0];[1:v]setpts=0.5*PTS[v1];[2:v]setpts=1.25*PTS[v2]"));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = CompositionPlan::new(&workspace(), SpeedPolicy::default()).args();
        let b = CompositionPlan::new(&workspace(), SpeedPolicy::default()).args();
        assert_eq!(a, b);
    }

    #[test]
    fn test_escape_plain_path() {
        assert_eq!(
            escape_filter_value(Path::new("/tmp/a/subtitles.srt")),
            "'/tmp/a/subtitles.srt'"
        );
    }

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape_filter_value(Path::new("C:/subs.srt")), "'C\\:/subs.srt'");
        assert_eq!(escape_filter_value(Path::new("/it's.srt")), "'/it\\'\\''s.srt'");
        // Graph separators stay inside the quotes
        assert_eq!(
            escape_filter_value(Path::new("/x;[y],z.srt")),
            "'/x;[y],z.srt'"
        );
    }
}
