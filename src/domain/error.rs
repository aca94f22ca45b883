use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("A download is already in progress")]
    Busy,

    #[error("Download failed: {0}")]
    Engine(String),

    #[error("No completed files found in temp folder after download")]
    NoOutput,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
