use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use super::{
    EngineError, FetchConfig, FetchObserver, FetchOutcome, MediaFetchEngine, PostProcessor,
    ProgressSample,
};

const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Machine-readable progress line: downloaded, total, estimate, filename.
const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.filename)s";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

struct OutputLine {
    stream: Stream,
    text: String,
}

/// Drives the `yt-dlp` executable as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn build_args(config: &FetchConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--continue".into(),
            "--yes-playlist".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-f".into(),
            config.format.clone().into(),
        ];

        if let Some(container) = &config.merge_container {
            args.push("--merge-output-format".into());
            args.push(container.into());
        }

        args.push("-o".into());
        args.push(config.output_template.clone().into_os_string());

        for step in &config.post_processors {
            match step {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("-x".into());
                    args.push("--audio-format".into());
                    args.push(codec.into());
                    args.push("--audio-quality".into());
                    args.push(quality.into());
                }
                PostProcessor::RemoveSegments {
                    categories,
                    chapter_title,
                } => {
                    let joined = categories
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(",");
                    args.push("--sponsorblock-remove".into());
                    args.push(joined.into());
                    args.push("--sponsorblock-chapter-title".into());
                    args.push(chapter_title.into());
                }
                PostProcessor::EmbedChapters => {
                    args.push("--embed-chapters".into());
                }
            }
        }

        args.push("--".into());
        args.push(config.url.clone().into());
        args
    }

    fn spawn(&self, args: &[OsString]) -> Result<Child, EngineError> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so ffmpeg helpers can be killed along with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.display().to_string(),
            source,
        })
    }
}

impl MediaFetchEngine for YtDlpEngine {
    fn fetch(
        &self,
        config: &FetchConfig,
        observer: &mut dyn FetchObserver,
    ) -> Result<FetchOutcome, EngineError> {
        if observer.is_cancelled() {
            return Ok(FetchOutcome::Cancelled);
        }

        let args = Self::build_args(config);
        debug!(program = %self.program.display(), ?args, "Spawning yt-dlp");
        let mut child = self.spawn(&args)?;

        let (tx, rx) = mpsc::channel();
        spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), Stream::Stderr, tx);

        let mut last_error: Option<String> = None;
        loop {
            if observer.is_cancelled() {
                return terminate(child);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => handle_line(line, observer, &mut last_error),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child.wait()?;
        if status.success() {
            info!("yt-dlp finished");
            return Ok(FetchOutcome::Completed);
        }
        if observer.is_cancelled() {
            return Ok(FetchOutcome::Cancelled);
        }

        let reason = last_error.unwrap_or_else(|| format!("yt-dlp exited with {}", status));
        Err(EngineError::Exit(reason))
    }
}

fn spawn_reader<R>(source: Option<R>, stream: Stream, tx: Sender<OutputLine>)
where
    R: Read + Send + 'static,
{
    let Some(source) = source else {
        return;
    };
    std::thread::spawn(move || {
        for line in BufReader::new(source).lines() {
            let Ok(text) = line else {
                break;
            };
            if tx.send(OutputLine { stream, text }).is_err() {
                break;
            }
        }
    });
}

fn terminate(mut child: Child) -> Result<FetchOutcome, EngineError> {
    info!("Cancellation requested, stopping yt-dlp");
    kill_tree(&mut child);
    if let Err(e) = child.wait() {
        warn!("Failed to reap yt-dlp: {}", e);
    }
    Ok(FetchOutcome::Cancelled)
}

/// Kills yt-dlp and every process it started (merger, extractor, cutter).
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        kill_one(child);
        return;
    };
    // SAFETY: kill(2) takes no pointers; the group id is the one set in `spawn`.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!("killing process group failed: {}", std::io::Error::last_os_error());
        kill_one(child);
    }
}

#[cfg(windows)]
fn kill_tree(child: &mut Child) {
    let killed = Command::new("taskkill")
        .args(["/PID", &child.id().to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !killed {
        kill_one(child);
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(child: &mut Child) {
    kill_one(child);
}

fn kill_one(child: &mut Child) {
    if let Err(e) = child.kill() {
        // Already exited on its own.
        debug!("kill failed: {}", e);
    }
}

fn handle_line(line: OutputLine, observer: &mut dyn FetchObserver, last_error: &mut Option<String>) {
    let text = line.text.trim_end();
    if text.is_empty() {
        return;
    }
    if let Some(sample) = parse_progress_line(text) {
        observer.on_progress(sample);
        return;
    }

    debug!(stream = ?line.stream, "{}", text);
    if let Some(message) = parse_error_line(text) {
        observer.on_log(&format!("Error: {}", message));
        *last_error = Some(message.to_string());
    } else if let Some(message) = text.strip_prefix("WARNING:") {
        observer.on_log(&format!("Warning: {}", message.trim()));
    } else if line.stream == Stream::Stderr || !text.starts_with("[download]") {
        observer.on_log(text);
    }
}

fn progress_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[progress\]\s+(\S+)\s+(\S+)\s+(\S+)\s+(.+)$").ok())
        .as_ref()
}

fn error_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ERROR:\s*(.+)$").ok()).as_ref()
}

/// yt-dlp prints `NA` for unknown fields and may report estimates as floats.
fn parse_count(field: &str) -> Option<u64> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let caps = progress_regex()?.captures(line)?;
    let downloaded = parse_count(&caps[1]).unwrap_or(0);
    let total = parse_count(&caps[2])
        .or_else(|| parse_count(&caps[3]))
        .unwrap_or(0);
    let filename = match caps[4].trim() {
        "NA" | "" => None,
        name => Some(PathBuf::from(name)),
    };
    Some(ProgressSample {
        downloaded,
        total,
        filename,
    })
}

fn parse_error_line(line: &str) -> Option<&str> {
    error_regex()?
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
