//! Fakes shared by the job and host tests.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::engine::{
    EngineError, FetchConfig, FetchObserver, FetchOutcome, MediaFetchEngine, ProgressSample,
};

use super::download_job::CancelFlag;
use super::events::{JobEvent, JobEventSink};

/// Initialize tracing for tests, writing to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub enum Step {
    Touch(&'static str),
    /// File name given as raw bytes, for names that are not valid UTF-8.
    #[cfg(unix)]
    TouchRaw(&'static [u8]),
    Write(&'static str, &'static str),
    Rename(&'static str, &'static str),
    Progress(u64, u64, Option<&'static str>),
    Log(&'static str),
}

#[derive(Debug, Clone)]
enum Ending {
    Complete,
    Fail(String),
}

/// Plays a fixed script against the working directory, polling for
/// cancellation before every step like the real engine does.
#[derive(Debug)]
pub struct ScriptedEngine {
    dir: PathBuf,
    steps: Vec<Step>,
    ending: Ending,
    seen: Mutex<Option<FetchConfig>>,
}

impl ScriptedEngine {
    pub fn completing(dir: &Path, steps: Vec<Step>) -> Self {
        Self::with_ending(dir, steps, Ending::Complete)
    }

    pub fn failing(dir: &Path, steps: Vec<Step>, reason: &str) -> Self {
        Self::with_ending(dir, steps, Ending::Fail(reason.to_string()))
    }

    fn with_ending(dir: &Path, steps: Vec<Step>, ending: Ending) -> Self {
        Self {
            dir: dir.to_path_buf(),
            steps,
            ending,
            seen: Mutex::new(None),
        }
    }

    pub fn last_config(&self) -> Option<FetchConfig> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MediaFetchEngine for ScriptedEngine {
    fn fetch(
        &self,
        config: &FetchConfig,
        observer: &mut dyn FetchObserver,
    ) -> Result<FetchOutcome, EngineError> {
        *self.seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());

        for step in &self.steps {
            if observer.is_cancelled() {
                return Ok(FetchOutcome::Cancelled);
            }
            match step {
                Step::Touch(name) => std::fs::write(self.dir.join(name), b"data")?,
                #[cfg(unix)]
                Step::TouchRaw(name) => {
                    use std::os::unix::ffi::OsStrExt;
                    std::fs::write(self.dir.join(std::ffi::OsStr::from_bytes(name)), b"data")?
                }
                Step::Write(name, contents) => std::fs::write(self.dir.join(name), contents)?,
                Step::Rename(from, to) => std::fs::rename(self.dir.join(from), self.dir.join(to))?,
                Step::Progress(downloaded, total, file) => observer.on_progress(ProgressSample {
                    downloaded: *downloaded,
                    total: *total,
                    filename: file.map(|f| self.dir.join(f)),
                }),
                Step::Log(line) => observer.on_log(line),
            }
        }

        if observer.is_cancelled() {
            return Ok(FetchOutcome::Cancelled);
        }
        match &self.ending {
            Ending::Complete => Ok(FetchOutcome::Completed),
            Ending::Fail(reason) => Err(EngineError::Exit(reason.clone())),
        }
    }
}

/// Records every event; optionally plays a user pressing cancel once
/// progress reaches a threshold.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<JobEvent>>,
    cancel_at: Option<(u8, CancelFlag)>,
}

impl RecordingSink {
    pub fn cancelling_at(percent: u8, flag: CancelFlag) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_at: Some((percent, flag)),
        }
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Log(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: JobEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl JobEventSink for RecordingSink {
    fn on_progress(&self, percent: u8) {
        self.push(JobEvent::Progress(percent));
        if let Some((threshold, flag)) = &self.cancel_at {
            if percent >= *threshold {
                flag.cancel();
            }
        }
    }

    fn on_log(&self, text: &str) {
        self.push(JobEvent::Log(text.to_string()));
    }

    fn on_succeeded(&self, message: &str, final_paths: &[PathBuf]) {
        self.push(JobEvent::Succeeded {
            message: message.to_string(),
            final_paths: final_paths.to_vec(),
        });
    }

    fn on_error(&self, message: &str) {
        self.push(JobEvent::Error(message.to_string()));
    }

    fn on_cancelled(&self, attempted_paths: &[PathBuf]) {
        self.push(JobEvent::Cancelled(attempted_paths.to_vec()));
    }
}
