use std::io;
use std::path::Path;

/// Moves a file, replacing `target` if it exists. Falls back to copy and
/// delete when the two paths are on different filesystems.
pub fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match std::fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(_) if source.is_file() => {
            std::fs::copy(source, target)?;
            std::fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}

/// Deletes a file or directory tree. Something already gone counts as deleted.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Shortens `path` to `~/...` when it lives under the home directory.
pub fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(rest) if !rest.as_os_str().is_empty() => format!("~/{}", rest.display()),
        _ => path.display().to_string(),
    }
}
