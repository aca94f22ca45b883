use std::io;
use std::path::{Path, PathBuf};

pub const MARKER_FILE_NAME: &str = "current_download.txt";

/// What to do with the working directory before fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Keep the directory; the engine continues partial files.
    Resume,
    /// Wipe the directory; whatever is there belongs to another attempt.
    Restart,
}

/// Decides between resuming and restarting from the marker contents alone.
pub fn decide_start(marker: Option<&str>, requested_url: &str) -> StartMode {
    match marker {
        Some(previous) if previous.trim() == requested_url.trim() => StartMode::Resume,
        _ => StartMode::Restart,
    }
}

/// URL of the unfinished attempt that owns the working directory.
#[derive(Debug, Clone)]
pub struct ResumeMarker {
    path: PathBuf,
}

impl ResumeMarker {
    pub fn in_dir(working_dir: &Path) -> Self {
        Self {
            path: working_dir.join(MARKER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write(&self, url: &str) -> io::Result<()> {
        std::fs::write(&self.path, url)
    }

    /// Returns whether a marker was actually removed.
    pub fn remove(&self) -> io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_start() {
        assert_eq!(decide_start(None, "u1"), StartMode::Restart);
        assert_eq!(decide_start(Some("u1"), "u1"), StartMode::Resume);
        assert_eq!(decide_start(Some("u1\n"), " u1"), StartMode::Resume);
        assert_eq!(decide_start(Some("u2"), "u1"), StartMode::Restart);
        assert_eq!(decide_start(Some(""), "u1"), StartMode::Restart);
    }

    #[test]
    fn test_marker_roundtrip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = ResumeMarker::in_dir(tmp.path());
        assert_eq!(marker.read().unwrap(), None);
        assert!(!marker.remove().unwrap());

        marker.write("https://example.com/v").unwrap();
        assert_eq!(marker.path(), tmp.path().join(MARKER_FILE_NAME));
        assert_eq!(marker.read().unwrap().as_deref(), Some("https://example.com/v"));
        assert!(marker.remove().unwrap());
        assert!(!marker.path().exists());
    }
}
