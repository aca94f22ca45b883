//! Boundary to the media extraction engine.
//!
//! The orchestrator never fetches bytes itself. It hands a [`FetchConfig`] to a
//! [`MediaFetchEngine`] and supervises the call through a [`FetchObserver`].

mod ytdlp;

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::JobRequest;

pub use ytdlp::YtDlpEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Exit(String),

    #[error("I/O error while supervising engine: {0}")]
    Io(#[from] std::io::Error),
}

/// How a fetch ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed,
    Cancelled,
}

/// One raw progress report from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    pub downloaded: u64,
    pub total: u64,
    /// File the engine is currently writing, if it said.
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCategory {
    Sponsor,
    Intro,
    Outro,
    SelfPromo,
    Interaction,
    Filler,
}

impl SegmentCategory {
    pub const SPONSOR_SET: [SegmentCategory; 5] = [
        SegmentCategory::Sponsor,
        SegmentCategory::Intro,
        SegmentCategory::Outro,
        SegmentCategory::SelfPromo,
        SegmentCategory::Interaction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentCategory::Sponsor => "sponsor",
            SegmentCategory::Intro => "intro",
            SegmentCategory::Outro => "outro",
            SegmentCategory::SelfPromo => "selfpromo",
            SegmentCategory::Interaction => "interaction",
            SegmentCategory::Filler => "filler",
        }
    }
}

/// Post-processing steps, applied by the engine in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    ExtractAudio { codec: String, quality: String },
    RemoveSegments {
        categories: Vec<SegmentCategory>,
        chapter_title: String,
    },
    EmbedChapters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub url: String,
    pub format: String,
    pub merge_container: Option<String>,
    pub output_template: PathBuf,
    pub post_processors: Vec<PostProcessor>,
}

impl FetchConfig {
    pub fn from_request(request: &JobRequest) -> Self {
        let stem = request.custom_name.as_deref().unwrap_or("%(title)s");
        let output_template = request.working_dir.join(format!("{}.%(ext)s", stem));

        let mut post_processors = Vec::new();
        if request.format.extracts_audio() {
            post_processors.push(PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "192K".to_string(),
            });
        }

        let mut categories = Vec::new();
        if request.remove_sponsor {
            categories.extend(SegmentCategory::SPONSOR_SET);
        }
        if request.remove_filler {
            categories.push(SegmentCategory::Filler);
        }
        if !categories.is_empty() {
            post_processors.push(PostProcessor::RemoveSegments {
                categories,
                chapter_title: "[SponsorBlock]: %(category_names)s".to_string(),
            });
            post_processors.push(PostProcessor::EmbedChapters);
        }

        Self {
            url: request.url.clone(),
            format: request.format.engine_format().to_string(),
            merge_container: request.format.merge_container().map(str::to_string),
            output_template,
            post_processors,
        }
    }
}

/// Callbacks the engine uses while a fetch is running.
pub trait FetchObserver {
    /// Polled by the engine before every callback and while idle.
    fn is_cancelled(&self) -> bool;

    fn on_progress(&mut self, sample: ProgressSample);

    fn on_log(&mut self, line: &str);
}

pub trait MediaFetchEngine: Send + Sync {
    /// Runs one fetch to completion. Blocks the calling thread.
    fn fetch(
        &self,
        config: &FetchConfig,
        observer: &mut dyn FetchObserver,
    ) -> Result<FetchOutcome, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FormatChoice;
    use std::path::Path;

    fn request(format: FormatChoice, name: Option<&str>, sponsor: bool, filler: bool) -> JobRequest {
        JobRequest::new("u1", format, name, Path::new("/out"), sponsor, filler).unwrap()
    }

    #[test]
    fn test_config_for_mp3_with_custom_name() {
        let config = FetchConfig::from_request(&request(FormatChoice::Mp3, Some("song"), false, false));
        assert_eq!(config.output_template, PathBuf::from("/out/temp/song.%(ext)s"));
        assert_eq!(config.merge_container, None);
        assert_eq!(
            config.post_processors,
            vec![PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
                quality: "192K".to_string(),
            }]
        );
    }

    #[test]
    fn test_config_uses_title_template() {
        let config = FetchConfig::from_request(&request(FormatChoice::Webm, None, false, false));
        assert_eq!(config.output_template, PathBuf::from("/out/temp/%(title)s.%(ext)s"));
        assert_eq!(config.merge_container.as_deref(), Some("webm"));
        assert!(config.post_processors.is_empty());
    }

    #[test]
    fn test_config_segment_removal() {
        let config = FetchConfig::from_request(&request(FormatChoice::Best, None, true, true));
        match &config.post_processors[..] {
            [PostProcessor::RemoveSegments { categories, .. }, PostProcessor::EmbedChapters] => {
                assert_eq!(categories.len(), 6);
                assert_eq!(categories.last(), Some(&SegmentCategory::Filler));
            }
            other => panic!("unexpected pipeline: {:?}", other),
        }

        let filler_only = FetchConfig::from_request(&request(FormatChoice::Best, None, false, true));
        assert!(matches!(
            &filler_only.post_processors[0],
            PostProcessor::RemoveSegments { categories, .. } if categories == &vec![SegmentCategory::Filler]
        ));
    }
}
