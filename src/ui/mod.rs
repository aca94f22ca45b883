use std::path::PathBuf;

use iced::{
    widget::{button, column, pick_list, progress_bar, row, scrollable, text, text_input, Column, Space},
    Element, Length,
};

use crate::{
    application::JobEvent,
    config::{Language, Preferences},
    domain::FormatChoice,
    utils::display_path,
};

const MAX_LOG_LINES: usize = 500;

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub custom_name: String,
    pub format: FormatChoice,
    pub language: Language,
    pub download_folder: PathBuf,
    pub remove_sponsor: bool,
    pub remove_filler: bool,
    pub status_message: String,
    pub progress: u8,
    pub log_lines: Vec<String>,
    pub is_downloading: bool,
    pub is_cancelling: bool,
}

impl DownloadView {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            url: String::new(),
            custom_name: String::new(),
            format: prefs.format_choice,
            language: prefs.language,
            download_folder: prefs.download_folder.clone(),
            remove_sponsor: false,
            remove_filler: false,
            status_message: "Ready".to_string(),
            progress: 0,
            log_lines: Vec::new(),
            is_downloading: false,
            is_cancelling: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    CustomNameChanged(String),
    FormatSelected(FormatChoice),
    LanguageSelected(Language),
    SponsorToggled,
    FillerToggled,
    ChooseFolderPressed,
    DownloadPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::CustomNameChanged(name) => {
                self.custom_name = name;
            }
            DownloadMessage::FormatSelected(format) => {
                self.format = format;
            }
            DownloadMessage::LanguageSelected(language) => {
                self.language = language;
            }
            DownloadMessage::SponsorToggled => {
                self.remove_sponsor = !self.remove_sponsor;
            }
            DownloadMessage::FillerToggled => {
                self.remove_filler = !self.remove_filler;
            }
            DownloadMessage::ChooseFolderPressed
            | DownloadMessage::DownloadPressed
            | DownloadMessage::CancelPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn begin_download(&mut self) {
        self.is_downloading = true;
        self.is_cancelling = false;
        self.progress = 0;
        self.log_lines.clear();
        self.status_message = "Downloading...".to_string();
    }

    pub fn begin_cancel(&mut self) {
        self.is_cancelling = true;
        self.status_message = "Cancelling...".to_string();
    }

    pub fn apply(&mut self, event: JobEvent) {
        if event.is_terminal() {
            self.is_downloading = false;
            self.is_cancelling = false;
        }
        match event {
            JobEvent::Progress(percent) => {
                self.progress = percent;
                if !self.is_cancelling {
                    self.status_message = format!("Downloading: {}%", percent);
                }
            }
            JobEvent::Log(line) => self.push_log(line),
            JobEvent::Succeeded {
                message,
                final_paths,
            } => {
                self.progress = 100;
                self.status_message = message;
                self.push_log(format!(
                    "Download completed. {} file(s) saved to {}",
                    final_paths.len(),
                    self.download_folder.display()
                ));
            }
            JobEvent::Error(message) => {
                self.progress = 0;
                self.status_message = message;
            }
            JobEvent::Cancelled(_) => {
                self.progress = 0;
                self.status_message = "Download cancelled".to_string();
            }
        }
    }

    fn push_log(&mut self, line: String) {
        self.log_lines.push(line);
        if self.log_lines.len() > MAX_LOG_LINES {
            let excess = self.log_lines.len() - MAX_LOG_LINES;
            self.log_lines.drain(..excess);
        }
    }

    fn toggle_label(label: &str, on: bool) -> String {
        format!("[{}] {}", if on { "x" } else { " " }, label)
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let idle = !self.is_downloading;

        let options = row![
            text("Format:").size(16),
            pick_list(
                FormatChoice::ALL,
                Some(self.format),
                DownloadMessage::FormatSelected
            ),
            Space::new().width(Length::Fixed(20.0)),
            text("Language:").size(16),
            pick_list(
                Language::ALL,
                Some(self.language),
                DownloadMessage::LanguageSelected
            ),
        ]
        .spacing(10);

        let filters = row![
            button(text(Self::toggle_label("Remove sponsor segments", self.remove_sponsor)))
                .on_press_maybe(idle.then_some(DownloadMessage::SponsorToggled)),
            button(text(Self::toggle_label("Skip non-music parts", self.remove_filler)))
                .on_press_maybe(idle.then_some(DownloadMessage::FillerToggled)),
        ]
        .spacing(10);

        let folder = row![
            text(format!("Folder: {}", display_path(&self.download_folder))).size(14),
            button("Select folder")
                .on_press_maybe(idle.then_some(DownloadMessage::ChooseFolderPressed)),
        ]
        .spacing(10);

        let actions = row![
            button("Download")
                .on_press_maybe(idle.then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            button("Cancel")
                .on_press_maybe(
                    (self.is_downloading && !self.is_cancelling)
                        .then_some(DownloadMessage::CancelPressed)
                )
                .padding([10, 20]),
        ]
        .spacing(10);

        let log = Column::with_children(
            self.log_lines
                .iter()
                .map(|line| text(line.as_str()).size(12).into()),
        );

        column![
            text("Media Grabber").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("URL:").size(16),
            text_input("Paste a video, playlist or channel URL...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            text("File name (optional):").size(16),
            text_input("Leave empty to use the title", &self.custom_name)
                .on_input(DownloadMessage::CustomNameChanged)
                .padding(10),
            options,
            filters,
            folder,
            Space::new().height(Length::Fixed(10.0)),
            progress_bar(0.0..=100.0, f32::from(self.progress)),
            text(&self.status_message).size(14),
            actions,
            scrollable(log).height(Length::Fixed(160.0)),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
