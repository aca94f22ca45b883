use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    domain::{AppError, ArtifactKind, Discovery, JobPhase, JobRequest},
    engine::{FetchConfig, FetchObserver, FetchOutcome, MediaFetchEngine, ProgressSample},
    utils::{move_file, remove_entry},
};

use super::{
    artifacts::{self, ArtifactTracker},
    events::JobEventSink,
    progress::ProgressSmoother,
    resume::{decide_start, ResumeMarker, StartMode},
};

pub const SUCCESS_MESSAGE: &str = "Download completed successfully!";

/// Shared, write-once cancellation request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the call that actually raised the flag.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(Vec<PathBuf>),
    Cancelled(Vec<PathBuf>),
    Failed(AppError),
}

#[derive(Debug)]
struct JobState {
    phase: JobPhase,
    smoother: ProgressSmoother,
    /// Files the engine reported writing. Only grows.
    tracked: BTreeSet<PathBuf>,
    previous_marker: Option<String>,
    baseline: BTreeSet<PathBuf>,
}

/// One download attempt, from preparing the working directory to the
/// terminal event.
pub struct DownloadJob {
    request: JobRequest,
    cancel: CancelFlag,
    tracker: ArtifactTracker,
    marker: ResumeMarker,
    state: JobState,
}

impl DownloadJob {
    pub fn new(request: JobRequest, cancel: CancelFlag) -> Self {
        let tracker = ArtifactTracker::new(&request.working_dir, request.custom_name.clone());
        let marker = ResumeMarker::in_dir(&request.working_dir);
        Self {
            request,
            cancel,
            tracker,
            marker,
            state: JobState {
                phase: JobPhase::Starting,
                smoother: ProgressSmoother::new(),
                tracked: BTreeSet::new(),
                previous_marker: None,
                baseline: BTreeSet::new(),
            },
        }
    }

    /// Runs the attempt to a terminal state on the calling thread and reports
    /// exactly one terminal event to `sink`.
    pub fn run(mut self, engine: &dyn MediaFetchEngine, sink: &dyn JobEventSink) -> JobOutcome {
        let outcome = self.drive(engine, sink);
        match &outcome {
            JobOutcome::Succeeded(paths) => {
                info!(files = paths.len(), "Download finished");
                sink.on_succeeded(SUCCESS_MESSAGE, paths);
            }
            JobOutcome::Cancelled(paths) => {
                info!(
                    attempted = paths.len(),
                    reached = self.state.smoother.max_percent(),
                    "Download cancelled"
                );
                sink.on_log("Download cancelled by user");
                sink.on_cancelled(paths);
            }
            JobOutcome::Failed(e) => {
                warn!("Download failed: {}", e);
                sink.on_log(&format!("Error: {}", e));
                sink.on_error(&e.to_string());
            }
        }
        outcome
    }

    fn drive(&mut self, engine: &dyn MediaFetchEngine, sink: &dyn JobEventSink) -> JobOutcome {
        if let Err(e) = self.start(sink) {
            self.enter(JobPhase::Failed);
            return JobOutcome::Failed(e);
        }

        if self.cancel.is_cancelled() {
            self.enter(JobPhase::Cancelling);
            return self.clean_up_cancelled(sink);
        }

        self.enter(JobPhase::Fetching);
        let config = FetchConfig::from_request(&self.request);
        let fetched = {
            let mut observer = JobObserver {
                cancel: &self.cancel,
                smoother: &mut self.state.smoother,
                tracked: &mut self.state.tracked,
                working_dir: &self.request.working_dir,
                sink,
            };
            engine.fetch(&config, &mut observer)
        };

        match fetched {
            Ok(FetchOutcome::Completed) => {}
            Ok(FetchOutcome::Cancelled) => {
                self.enter(JobPhase::Cancelling);
                return self.clean_up_cancelled(sink);
            }
            Err(e) => {
                self.enter(JobPhase::Failed);
                return JobOutcome::Failed(AppError::Engine(e.to_string()));
            }
        }

        self.enter(JobPhase::Finalizing);
        match self.finalize(sink) {
            Ok(paths) => {
                self.enter(JobPhase::Succeeded);
                JobOutcome::Succeeded(paths)
            }
            Err(e) => {
                self.enter(JobPhase::Failed);
                JobOutcome::Failed(e)
            }
        }
    }

    fn enter(&mut self, next: JobPhase) {
        debug_assert!(!self.state.phase.is_terminal());
        debug_assert!(
            self.state.phase.can_transition_to(next),
            "illegal job transition {:?} -> {:?}",
            self.state.phase,
            next
        );
        debug!(from = ?self.state.phase, to = ?next, "Job phase change");
        self.state.phase = next;
    }

    fn start(&mut self, sink: &dyn JobEventSink) -> Result<(), AppError> {
        let working_dir = self.request.working_dir.clone();
        let previous = self.marker.read()?;
        let leftovers = self.tracker.transient()?;

        match decide_start(previous.as_deref(), &self.request.url) {
            StartMode::Resume => {
                info!(dir = %working_dir.display(), "Resuming previous download");
                sink.on_log("Resuming previous download...");
            }
            StartMode::Restart if previous.is_some() || !leftovers.is_empty() => {
                info!(
                    dir = %working_dir.display(),
                    previous = ?previous,
                    leftovers = leftovers.len(),
                    "Discarding files of another download"
                );
                std::fs::remove_dir_all(&working_dir)?;
            }
            StartMode::Restart => {}
        }
        self.state.previous_marker = previous;

        std::fs::create_dir_all(&self.request.destination_dir)?;
        std::fs::create_dir_all(&working_dir)?;
        self.state.baseline = self.tracker.snapshot()?;
        self.marker.write(&self.request.url)?;

        sink.on_log(&format!(
            "Starting download for URL: {}\nIf it's a playlist or channel, please wait...\nCancellation takes effect at the next progress update",
            self.request.url
        ));
        Ok(())
    }

    fn finalize(&mut self, sink: &dyn JobEventSink) -> Result<Vec<PathBuf>, AppError> {
        let completed = self.tracker.completed_media()?;
        if completed.is_empty() {
            return Err(AppError::NoOutput);
        }

        let mut final_paths = Vec::with_capacity(completed.len());
        for source in completed {
            let Some(name) = source.file_name() else {
                continue;
            };
            let target = self.request.destination_dir.join(name);
            sink.on_log(&format!(
                "Moving file: {} to {}",
                source.display(),
                target.display()
            ));
            match move_file(&source, &target) {
                Ok(()) => final_paths.push(target),
                Err(e) => {
                    warn!(source = %source.display(), "Move failed: {}", e);
                    sink.on_log(&format!(
                        "Warning: could not move {}: {}",
                        source.display(),
                        e
                    ));
                }
            }
        }

        match self.marker.remove() {
            Ok(true) => sink.on_log(&format!(
                "Deleted resume marker: {}",
                self.marker.path().display()
            )),
            Ok(false) => {}
            Err(e) => warn!("Failed to delete resume marker: {}", e),
        }

        let working_dir = self.tracker.dir();
        match artifacts::snapshot(working_dir) {
            Ok(rest) if rest.is_empty() => match std::fs::remove_dir(working_dir) {
                Ok(()) => sink.on_log(&format!(
                    "Deleted empty temp folder: {}",
                    working_dir.display()
                )),
                Err(e) => warn!("Failed to remove temp folder: {}", e),
            },
            Ok(rest) => {
                let names = rest
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                sink.on_log(&format!("Temp folder not empty, keeping: {}", names));
            }
            Err(e) => warn!("Failed to list temp folder: {}", e),
        }

        Ok(final_paths)
    }

    fn clean_up_cancelled(&mut self, sink: &dyn JobEventSink) -> JobOutcome {
        let working_dir = self.tracker.dir().to_path_buf();
        let marker_path = self.marker.path().to_path_buf();

        let mut doomed: BTreeSet<PathBuf> = match self.tracker.classify(&self.state.baseline) {
            Ok(found) => {
                let created = found
                    .iter()
                    .filter(|a| a.discovery == Discovery::New)
                    .count();
                debug!(created, matched = found.len() - created, "Classified temp folder");
                found
                    .into_iter()
                    .filter(|a| a.kind != ArtifactKind::MarkerFile)
                    .map(|a| a.path)
                    .collect()
            }
            Err(e) => {
                warn!("Failed to scan temp folder: {}", e);
                sink.on_log(&format!("Warning: could not scan temp folder: {}", e));
                BTreeSet::new()
            }
        };
        doomed.extend(
            self.state
                .tracked
                .iter()
                .filter(|p| p.starts_with(&working_dir) && **p != marker_path && p.exists())
                .cloned(),
        );

        debug!(
            previous_marker = ?self.state.previous_marker,
            count = doomed.len(),
            "Removing files of cancelled download"
        );
        for path in &doomed {
            if let Err(e) = remove_entry(path) {
                warn!(path = %path.display(), "Failed to delete: {}", e);
                sink.on_log(&format!(
                    "Warning: could not delete {}: {}",
                    path.display(),
                    e
                ));
            }
        }

        self.enter(JobPhase::Cancelled);
        JobOutcome::Cancelled(doomed.into_iter().collect())
    }
}

/// Engine-facing view of the job while fetching.
struct JobObserver<'a> {
    cancel: &'a CancelFlag,
    smoother: &'a mut ProgressSmoother,
    tracked: &'a mut BTreeSet<PathBuf>,
    working_dir: &'a Path,
    sink: &'a dyn JobEventSink,
}

impl JobObserver<'_> {
    fn track(&mut self, file: PathBuf) {
        let file = if file.is_absolute() {
            file
        } else {
            self.working_dir.join(file)
        };
        if !file.starts_with(self.working_dir) {
            return;
        }
        if !file.to_string_lossy().ends_with(".part") {
            let mut part = file.clone().into_os_string();
            part.push(".part");
            self.tracked.insert(PathBuf::from(part));
        }
        self.tracked.insert(file);
    }
}

impl FetchObserver for JobObserver<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn on_progress(&mut self, sample: ProgressSample) {
        if let Some(file) = sample.filename {
            self.track(file);
        }
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(percent) = self.smoother.observe(sample.downloaded, sample.total) {
            self.sink.on_progress(percent);
        }
    }

    fn on_log(&mut self, line: &str) {
        self.sink.on_log(line);
    }
}
