use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use iced::Task;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::application::download_job::JobOutcome;
use crate::application::{ChannelSink, JobEvent, JobHandle, JobHost, Submission};
use crate::config::{Preferences, PreferencesStore};
use crate::engine::YtDlpEngine;
use crate::ui::{DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    host: JobHost,
    store: PreferencesStore,
    prefs: Preferences,
    // Worker of the running download, joined once it reports a terminal event
    job: Option<JobHandle>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(PreferencesStore::default_location())
    }
}

impl DownloadApp {
    pub fn new(store: PreferencesStore) -> Self {
        let prefs = store.load();
        let engine = match &prefs.engine_path {
            Some(path) => YtDlpEngine::new(path.clone()),
            None => YtDlpEngine::default(),
        };
        info!(config = %store.path().display(), "Preferences loaded");

        Self {
            view: DownloadView::from_preferences(&prefs),
            host: JobHost::new(Arc::new(engine)),
            store,
            prefs,
            job: None,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.prefs) {
            warn!("Failed to save preferences: {}", e);
        }
    }

    fn start_download(&mut self) -> Task<Message> {
        let custom_name = self.view.custom_name.trim();
        let submission = Submission {
            url: self.view.url.clone(),
            format: self.view.format,
            custom_name: (!custom_name.is_empty()).then(|| custom_name.to_string()),
            download_folder: self.prefs.download_folder.clone(),
            remove_sponsor: self.view.remove_sponsor,
            remove_filler: self.view.remove_filler,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        match self.host.submit(submission, Arc::new(ChannelSink::new(tx))) {
            Ok(handle) => {
                self.job = Some(handle);
                self.view.begin_download();
                Task::stream(job_events(rx).map(Message::Job))
            }
            Err(e) => {
                self.view.status_message = e.to_string();
                Task::none()
            }
        }
    }

    /// Called on the terminal event, which is the worker's last act, so the
    /// join only waits for the thread to unwind.
    fn reap_job(&mut self) {
        if let Some(handle) = self.job.take() {
            match handle.join() {
                JobOutcome::Failed(e) => info!("Download worker finished with error: {}", e),
                outcome => info!(?outcome, "Download worker finished"),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Folder picked in the dialog, `None` if the dialog was dismissed
    FolderSelected(Option<PathBuf>),
    /// Event relayed from the running download
    Job(JobEvent),
}

/// Adapts the job's event channel to a stream iced can drive.
fn job_events(rx: UnboundedReceiver<JobEvent>) -> impl Stream<Item = JobEvent> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::FormatSelected(format) => {
                    app.prefs.format_choice = format;
                    app.persist();
                }
                DownloadMessage::LanguageSelected(language) => {
                    app.prefs.language = language;
                    app.persist();
                }
                DownloadMessage::ChooseFolderPressed => {
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .set_title("Select download folder")
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderSelected,
                    );
                }
                DownloadMessage::DownloadPressed => {
                    if !app.view.is_downloading {
                        return app.start_download();
                    }
                }
                DownloadMessage::CancelPressed => {
                    if app.host.cancel() {
                        app.view.begin_cancel();
                    }
                }
                _ => {}
            }
        }
        Message::FolderSelected(folder) => {
            if let Some(folder) = folder {
                info!(folder = %folder.display(), "Download folder changed");
                app.view.download_folder = folder.clone();
                app.prefs.download_folder = folder;
                app.persist();
            }
        }
        Message::Job(event) => {
            let terminal = event.is_terminal();
            app.view.apply(event);
            if terminal {
                app.reap_job();
            }
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
