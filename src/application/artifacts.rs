use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{Artifact, ArtifactKind, Discovery};

use super::resume::MARKER_FILE_NAME;

/// Extensions of finished media files, as produced by the supported formats.
pub const MEDIA_EXTENSIONS: [&str; 3] = ["mp3", "mp4", "webm"];

/// Lists the current entries of `dir`, non-recursively. A missing directory is empty.
pub fn snapshot(dir: &Path) -> io::Result<BTreeSet<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e),
    };

    let mut paths = BTreeSet::new();
    for entry in entries {
        paths.insert(entry?.path());
    }
    Ok(paths)
}

/// Kind of a working-directory entry, judged from its file name alone.
pub fn kind_of(name: &str) -> ArtifactKind {
    if name == MARKER_FILE_NAME {
        ArtifactKind::MarkerFile
    } else if name.contains(".part-Frag") {
        ArtifactKind::FragmentPart
    } else if name.ends_with(".part") {
        ArtifactKind::InProgressPart
    } else if is_media_name(name) {
        ArtifactKind::CompletedMedia
    } else {
        ArtifactKind::SidecarMetadata
    }
}

/// Matches `*.part`, `*.part-Frag*` and `*.ytdl`.
pub fn is_transient_name(name: &str) -> bool {
    name.ends_with(".part") || name.contains(".part-Frag") || name.ends_with(".ytdl")
}

fn is_media_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Lossy so that names which are not valid UTF-8 still classify by suffix.
fn file_name(path: &Path) -> Option<Cow<'_, str>> {
    path.file_name().map(|name| name.to_string_lossy())
}

/// Classifies what a download attempt left in its working directory.
#[derive(Debug, Clone)]
pub struct ArtifactTracker {
    dir: PathBuf,
    custom_prefix: Option<String>,
}

impl ArtifactTracker {
    pub fn new(dir: impl Into<PathBuf>, custom_prefix: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            custom_prefix,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self) -> io::Result<BTreeSet<PathBuf>> {
        snapshot(&self.dir)
    }

    /// Entries absent from `baseline`, plus transient-suffix matches and
    /// custom-name matches regardless of the baseline.
    ///
    /// Engine fragments carry title-derived names that cannot be predicted up
    /// front, so the diff alone misses files that were renamed or recreated
    /// within the same attempt.
    pub fn classify(&self, baseline: &BTreeSet<PathBuf>) -> io::Result<BTreeSet<Artifact>> {
        let mut artifacts = BTreeSet::new();
        for path in self.snapshot()? {
            let Some(name) = file_name(&path) else {
                continue;
            };
            let is_new = !baseline.contains(&path);
            let matches_prefix = self
                .custom_prefix
                .as_deref()
                .map(|prefix| name.starts_with(prefix))
                .unwrap_or(false);

            if is_new || is_transient_name(&name) || matches_prefix {
                let kind = kind_of(&name);
                artifacts.insert(Artifact {
                    path: path.clone(),
                    kind,
                    discovery: if is_new {
                        Discovery::New
                    } else {
                        Discovery::PreExisting
                    },
                });
            }
        }
        Ok(artifacts)
    }

    /// Finished media files ready to be moved out. Never the marker.
    pub fn completed_media(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|path| path.is_file())
            .filter(|path| {
                file_name(path)
                    .map(|name| kind_of(&name) == ArtifactKind::CompletedMedia)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Suffix-pattern scan only.
    pub fn transient(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|path| {
                file_name(path)
                    .map(|name| is_transient_name(&name))
                    .unwrap_or(false)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_snapshot_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(snapshot(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of("current_download.txt"), ArtifactKind::MarkerFile);
        assert_eq!(kind_of("a.mp4.part"), ArtifactKind::InProgressPart);
        assert_eq!(kind_of("a.mp4.part-Frag12"), ArtifactKind::FragmentPart);
        assert_eq!(kind_of("a.mp4.part-Frag12.part"), ArtifactKind::FragmentPart);
        assert_eq!(kind_of("a.mp4.ytdl"), ArtifactKind::SidecarMetadata);
        assert_eq!(kind_of("a.info.json"), ArtifactKind::SidecarMetadata);
        assert_eq!(kind_of("A.MP3"), ArtifactKind::CompletedMedia);
        assert_eq!(kind_of("a.webm"), ArtifactKind::CompletedMedia);
    }

    #[test]
    fn test_classify_diff_suffix_and_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let old_part = touch(dir, "old.mp4.part");
        let old_media = touch(dir, "keep.mp3");
        let old_named = touch(dir, "song.f251.webm");
        let tracker = ArtifactTracker::new(dir, Some("song".to_string()));
        let baseline = tracker.snapshot().unwrap();

        let new_frag = touch(dir, "Title.mp4.part-Frag3");
        let new_sidecar = touch(dir, "Title.mp4.ytdl");

        let found = tracker.classify(&baseline).unwrap();
        let paths: BTreeSet<_> = found.iter().map(|a| a.path.clone()).collect();

        assert!(paths.contains(&old_part));
        assert!(paths.contains(&old_named));
        assert!(paths.contains(&new_frag));
        assert!(paths.contains(&new_sidecar));
        assert!(!paths.contains(&old_media));

        let frag = found.iter().find(|a| a.path == new_frag).unwrap();
        assert_eq!(frag.kind, ArtifactKind::FragmentPart);
        assert_eq!(frag.discovery, Discovery::New);
        let part = found.iter().find(|a| a.path == old_part).unwrap();
        assert_eq!(part.discovery, Discovery::PreExisting);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_classified() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let old_part = dir.join(OsStr::from_bytes(b"old\xff.mp4.part"));
        fs::write(&old_part, b"x").unwrap();
        let tracker = ArtifactTracker::new(dir, None);
        let baseline = tracker.snapshot().unwrap();

        let sidecar = dir.join(OsStr::from_bytes(b"caf\xe9.info.json"));
        let media = dir.join(OsStr::from_bytes(b"caf\xe9.mp3"));
        fs::write(&sidecar, b"x").unwrap();
        fs::write(&media, b"x").unwrap();

        let found = tracker.classify(&baseline).unwrap();
        let kinds: Vec<_> = found.iter().map(|a| (a.path.clone(), a.kind)).collect();
        assert!(kinds.contains(&(old_part.clone(), ArtifactKind::InProgressPart)));
        assert!(kinds.contains(&(sidecar, ArtifactKind::SidecarMetadata)));
        assert!(kinds.contains(&(media.clone(), ArtifactKind::CompletedMedia)));

        assert_eq!(tracker.transient().unwrap(), vec![old_part]);
        assert_eq!(tracker.completed_media().unwrap(), vec![media]);
    }

    #[test]
    fn test_completed_media_excludes_marker_and_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        touch(dir, MARKER_FILE_NAME);
        touch(dir, "a.mp3.part");
        touch(dir, "cover.jpg");
        let mp3 = touch(dir, "a.mp3");
        let webm = touch(dir, "b.webm");
        fs::create_dir(dir.join("nested.mp4")).unwrap();

        let tracker = ArtifactTracker::new(dir, None);
        assert_eq!(tracker.completed_media().unwrap(), vec![mp3, webm]);
        assert_eq!(tracker.transient().unwrap(), vec![dir.join("a.mp3.part")]);
    }
}
