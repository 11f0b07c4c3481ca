use crate::utils::app_paths::AppPaths;
use chrono::Local;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Maximum number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 1000;

/// Environment variable holding the tracing filter directives
pub const LOG_ENV_VAR: &str = "DATASET_ANALYZER_LOG";

/// A log entry with timestamp and message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message,
        }
    }

    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

/// Thread-safe ring buffer for log entries
#[derive(Clone)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The last `count` entries, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Split a compact-format line ("LEVEL target: message") into its parts
fn parse_line(line: &str) -> (Level, &str, &str) {
    let levels = [
        ("TRACE ", Level::TRACE),
        ("DEBUG ", Level::DEBUG),
        ("INFO ", Level::INFO),
        ("WARN ", Level::WARN),
        ("ERROR ", Level::ERROR),
    ];

    let Some((level, rest)) = levels.iter().find_map(|(prefix, level)| {
        line.trim_start()
            .strip_prefix(prefix)
            .map(|rest| (*level, rest.trim_start()))
    }) else {
        return (Level::INFO, "general", line);
    };

    match rest.split_once(':') {
        Some((target, message)) if !target.contains(' ') => (level, target, message.trim()),
        _ => (level, "general", rest),
    }
}

/// Writer that tees each formatted event into the ring buffer and,
/// when one could be opened, the session log file
#[derive(Clone)]
pub struct TeeWriter {
    buffer: LogRingBuffer,
    file: Option<Arc<Mutex<File>>>,
}

impl TeeWriter {
    pub fn new(buffer: LogRingBuffer, file: Option<File>) -> Self {
        Self {
            buffer,
            file: file.map(|f| Arc::new(Mutex::new(f))),
        }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (level, target, message) = parse_line(line);
            let entry = LogEntry::new(level, target, message.to_string());

            if let Some(file) = &self.file {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(
                        file,
                        "[{}] {} [{}] {}",
                        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        entry.level,
                        entry.target,
                        entry.message
                    );
                }
            }
            self.buffer.push(entry);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                file.flush()?;
            }
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for TeeWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Global log buffer accessible throughout the application
static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();
static LOG_FILE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Get the global log buffer
pub fn get_log_buffer() -> Option<LogRingBuffer> {
    LOG_BUFFER.get().cloned()
}

/// Path of this session's log file, if one was opened
pub fn log_file_path() -> Option<&'static PathBuf> {
    LOG_FILE_PATH.get()
}

fn open_session_log() -> Option<(File, PathBuf)> {
    let log_dir = AppPaths::log_dir().ok()?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = log_dir.join(format!("dataset-analyzer_{}.log", timestamp));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    Some((file, path))
}

/// Install the global subscriber: ring buffer plus session log file,
/// filtered by `DATASET_ANALYZER_LOG` (default `info`).
///
/// Nothing is written to the terminal. Calling this twice keeps the
/// first subscriber and returns the same buffer.
pub fn init_tracing() -> LogRingBuffer {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Some(buffer) = get_log_buffer() {
        return buffer;
    }

    let buffer = LOG_BUFFER.get_or_init(LogRingBuffer::new).clone();
    let file = match open_session_log() {
        Some((file, path)) => {
            let _ = LOG_FILE_PATH.set(path);
            Some(file)
        }
        None => None,
    };

    let fmt_layer = fmt::layer()
        .with_writer(TeeWriter::new(buffer.clone(), file))
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time() // timestamps are added per entry
        .compact();

    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::info!(target: "logging", "Logging initialized");
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let buffer = LogRingBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.push(LogEntry::new(Level::INFO, "test", format!("m{}", i)));
        }
        assert_eq!(buffer.len(), 3);

        let recent: Vec<String> = buffer
            .get_recent(2)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(buffer.get_recent(10).len(), 3);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_compact_line() {
        let (level, target, message) = parse_line(" WARN normalizer: repaired 2 cells");
        assert_eq!(level, Level::WARN);
        assert_eq!(target, "normalizer");
        assert_eq!(message, "repaired 2 cells");

        let (level, target, message) = parse_line("INFO no target here: really");
        assert_eq!(level, Level::INFO);
        assert_eq!(target, "general");
        assert_eq!(message, "no target here: really");

        let (_, target, message) = parse_line("plain text");
        assert_eq!(target, "general");
        assert_eq!(message, "plain text");
    }

    #[test]
    fn test_tee_writer_fills_buffer_and_file() {
        let buffer = LogRingBuffer::new();
        let file = tempfile::NamedTempFile::new().unwrap();
        let handle = file.reopen().unwrap();

        let mut writer = TeeWriter::new(buffer.clone(), Some(handle));
        writer.write_all(b"DEBUG store: wrote 3 rows\n").unwrap();
        writer.flush().unwrap();

        let entries = buffer.get_recent(1);
        assert_eq!(entries[0].level, "DEBUG");
        assert_eq!(entries[0].target, "store");

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("DEBUG [store] wrote 3 rows"));
    }
}
