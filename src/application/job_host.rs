use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::{
    domain::{AppError, FormatChoice, JobRequest},
    engine::MediaFetchEngine,
};

use super::{
    download_job::{CancelFlag, DownloadJob, JobOutcome},
    events::JobEventSink,
};

/// Everything the presentation layer collects before pressing download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub format: FormatChoice,
    pub custom_name: Option<String>,
    pub download_folder: PathBuf,
    pub remove_sponsor: bool,
    pub remove_filler: bool,
}

impl Submission {
    fn into_request(self) -> Result<JobRequest, AppError> {
        JobRequest::new(
            &self.url,
            self.format,
            self.custom_name.as_deref(),
            Path::new(&self.download_folder),
            self.remove_sponsor,
            self.remove_filler,
        )
    }
}

/// Handle to the job started by [`JobHost::submit`].
pub struct JobHandle {
    thread: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// Blocks until the job reaches a terminal state.
    pub fn join(self) -> JobOutcome {
        self.thread.join().unwrap_or_else(|_| {
            JobOutcome::Failed(AppError::Engine("download worker panicked".to_string()))
        })
    }
}

/// Runs at most one download at a time and relays its events.
#[derive(Clone)]
pub struct JobHost {
    engine: Arc<dyn MediaFetchEngine>,
    busy: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelFlag>>>,
}

impl JobHost {
    pub fn new(engine: Arc<dyn MediaFetchEngine>) -> Self {
        Self {
            engine,
            busy: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validates and starts a job on its own thread. Fails before touching
    /// the filesystem when the input is invalid or another job is running.
    pub fn submit(
        &self,
        submission: Submission,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<JobHandle, AppError> {
        let request = submission.into_request()?;

        // Held until the new flag is installed, so `cancel` never sees the
        // slot taken while `current` still holds the previous job's flag.
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Busy);
        }
        let cancel = CancelFlag::new();
        *current = Some(cancel.clone());
        drop(current);

        let engine = Arc::clone(&self.engine);
        let relay = HostSink::new(sink, Arc::clone(&self.busy));
        info!(url = %request.url, "Submitting download");
        let job = DownloadJob::new(request, cancel);

        let spawned = std::thread::Builder::new()
            .name("download-job".to_string())
            .spawn(move || job.run(engine.as_ref(), &relay));

        match spawned {
            Ok(thread) => Ok(JobHandle { thread }),
            Err(e) => {
                // The dropped closure released the slot.
                error!("Failed to start download thread: {}", e);
                Err(AppError::Io(e.to_string()))
            }
        }
    }

    /// Requests cancellation of the running job. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_busy() {
            return false;
        }
        match current.as_ref() {
            Some(flag) => {
                if flag.cancel() {
                    info!("Cancellation requested");
                }
                true
            }
            None => false,
        }
    }
}

/// Frees the host slot just before a terminal event goes out, so whoever
/// reacts to that event can submit again straight away.
struct HostSink {
    inner: Arc<dyn JobEventSink>,
    busy: Arc<AtomicBool>,
    released: AtomicBool,
}

impl HostSink {
    fn new(inner: Arc<dyn JobEventSink>, busy: Arc<AtomicBool>) -> Self {
        Self {
            inner,
            busy,
            released: AtomicBool::new(false),
        }
    }

    /// Releases at most once; the slot may already belong to the next job.
    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for HostSink {
    fn drop(&mut self) {
        // Covers a worker that panicked before reporting.
        self.release();
    }
}

impl JobEventSink for HostSink {
    fn on_progress(&self, percent: u8) {
        self.inner.on_progress(percent);
    }

    fn on_log(&self, text: &str) {
        self.inner.on_log(text);
    }

    fn on_succeeded(&self, message: &str, final_paths: &[PathBuf]) {
        self.release();
        self.inner.on_succeeded(message, final_paths);
    }

    fn on_error(&self, message: &str) {
        self.release();
        self.inner.on_error(message);
    }

    fn on_cancelled(&self, attempted_paths: &[PathBuf]) {
        self.release();
        self.inner.on_cancelled(attempted_paths);
    }
}
