use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;

/// Receiver of everything a running job reports.
///
/// Exactly one of `on_succeeded`, `on_error` and `on_cancelled` is called per job.
pub trait JobEventSink: Send + Sync {
    fn on_progress(&self, percent: u8);
    fn on_log(&self, text: &str);
    fn on_succeeded(&self, message: &str, final_paths: &[PathBuf]);
    fn on_error(&self, message: &str);
    fn on_cancelled(&self, attempted_paths: &[PathBuf]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress(u8),
    Log(String),
    Succeeded {
        message: String,
        final_paths: Vec<PathBuf>,
    },
    Error(String),
    Cancelled(Vec<PathBuf>),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Succeeded { .. } | JobEvent::Error(_) | JobEvent::Cancelled(_)
        )
    }
}

/// Forwards events, in order, to whoever holds the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<JobEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: JobEvent) {
        // The receiver goes away when the window closes mid-download.
        let _ = self.tx.send(event);
    }
}

impl JobEventSink for ChannelSink {
    fn on_progress(&self, percent: u8) {
        self.send(JobEvent::Progress(percent));
    }

    fn on_log(&self, text: &str) {
        self.send(JobEvent::Log(text.to_string()));
    }

    fn on_succeeded(&self, message: &str, final_paths: &[PathBuf]) {
        self.send(JobEvent::Succeeded {
            message: message.to_string(),
            final_paths: final_paths.to_vec(),
        });
    }

    fn on_error(&self, message: &str) {
        self.send(JobEvent::Error(message.to_string()));
    }

    fn on_cancelled(&self, attempted_paths: &[PathBuf]) {
        self.send(JobEvent::Cancelled(attempted_paths.to_vec()));
    }
}
