use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::AppError;

/// Name of the working directory created inside the download folder.
pub const WORKING_DIR_NAME: &str = "temp";

/// Output format offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    #[default]
    #[serde(alias = "Best", alias = "Best video (recommended)")]
    Best,
    #[serde(alias = "MP4")]
    Mp4,
    #[serde(alias = "MP3")]
    Mp3,
    #[serde(alias = "WebM")]
    Webm,
}

impl FormatChoice {
    pub const ALL: [FormatChoice; 4] = [
        FormatChoice::Best,
        FormatChoice::Mp4,
        FormatChoice::Mp3,
        FormatChoice::Webm,
    ];

    /// Format selector understood by the fetch engine.
    pub fn engine_format(self) -> &'static str {
        match self {
            FormatChoice::Best => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best",
            FormatChoice::Mp4 => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]",
            FormatChoice::Mp3 => "bestaudio/best",
            FormatChoice::Webm => "bestvideo[ext=webm]+bestaudio[ext=webm]/best[ext=webm]",
        }
    }

    /// Container used when separate video and audio streams get merged.
    pub fn merge_container(self) -> Option<&'static str> {
        match self {
            FormatChoice::Best | FormatChoice::Mp4 => Some("mp4"),
            FormatChoice::Webm => Some("webm"),
            FormatChoice::Mp3 => None,
        }
    }

    pub fn extracts_audio(self) -> bool {
        self == FormatChoice::Mp3
    }
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormatChoice::Best => "Best video (recommended)",
            FormatChoice::Mp4 => "MP4",
            FormatChoice::Mp3 => "MP3",
            FormatChoice::Webm => "WebM",
        };
        f.write_str(label)
    }
}

/// Everything needed to run one download attempt. Built only through
/// [`JobRequest::new`], which enforces the input invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    pub format: FormatChoice,
    pub custom_name: Option<String>,
    pub destination_dir: PathBuf,
    pub working_dir: PathBuf,
    pub remove_sponsor: bool,
    pub remove_filler: bool,
}

impl JobRequest {
    pub fn new(
        url: &str,
        format: FormatChoice,
        custom_name: Option<&str>,
        download_folder: &Path,
        remove_sponsor: bool,
        remove_filler: bool,
    ) -> Result<Self, AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("Please enter a URL".to_string()));
        }
        if download_folder.as_os_str().is_empty() {
            return Err(AppError::Validation(
                "Please select a download folder".to_string(),
            ));
        }

        let custom_name = custom_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                if name.contains(['/', '\\']) {
                    Err(AppError::Validation(format!(
                        "File name must not contain path separators: {}",
                        name
                    )))
                } else {
                    Ok(name.to_string())
                }
            })
            .transpose()?;

        Ok(Self {
            url: url.to_string(),
            format,
            custom_name,
            destination_dir: download_folder.to_path_buf(),
            working_dir: download_folder.join(WORKING_DIR_NAME),
            remove_sponsor,
            remove_filler,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Starting,
    Fetching,
    Finalizing,
    Succeeded,
    Cancelling,
    Cancelled,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::Cancelled | JobPhase::Failed
        )
    }

    pub fn can_transition_to(self, next: JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, next),
            (Starting, Fetching)
                | (Starting, Cancelling)
                | (Starting, Failed)
                | (Fetching, Finalizing)
                | (Fetching, Cancelling)
                | (Fetching, Failed)
                | (Finalizing, Succeeded)
                | (Finalizing, Failed)
                | (Cancelling, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    InProgressPart,
    FragmentPart,
    SidecarMetadata,
    CompletedMedia,
    MarkerFile,
}

/// Whether an entry was already in the working directory when the attempt began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Discovery {
    PreExisting,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub discovery: Discovery,
}
