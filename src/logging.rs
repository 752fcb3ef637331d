//! Console + file logger behind the `log` facade.
//!
//! Every record is written as `[HH:MM:SS.mmm] LEVEL message` to stdout and
//! appended to the log file. Panics are written to the same file.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOG_FILE_NAME: &str = "widgetinc_tracker.log";

struct TrackerLogger {
    level: LevelFilter,
    file_path: PathBuf,
    // Serializes appends so lines from different threads never interleave
    write_lock: Mutex<()>,
}

fn format_line(level: Level, message: &str) -> String {
    format!(
        "[{}] {:<5} {}\n",
        Local::now().format("%H:%M:%S%.3f"),
        level,
        message
    )
}

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}

impl Log for TrackerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string());
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        print!("{}", line);
        append_line(&self.file_path, &line);
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Parses a level name from config; unknown names fall back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Installs the logger and the panic hook. Safe to call more than once; only
/// the first call takes effect.
pub fn init(logs_dir: &Path, level: LevelFilter) {
    let _ = fs::create_dir_all(logs_dir);
    let file_path = logs_dir.join(LOG_FILE_NAME);

    let logger = TrackerLogger {
        level,
        file_path: file_path.clone(),
        write_lock: Mutex::new(()),
    };
    if log::set_boxed_logger(Box::new(logger)).is_err() {
        return;
    }
    log::set_max_level(level);

    std::panic::set_hook(Box::new(move |panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let line = format!(
            "[{}] [PANIC] {}{}\n",
            Local::now().format("%H:%M:%S%.3f"),
            msg,
            location
        );
        eprint!("{}", line);
        append_line(&file_path, &line);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn test_line_format() {
        let line = format_line(Level::Warn, "Window lost");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] WARN  Window lost\n"));
        // [HH:MM:SS.mmm]
        assert_eq!(line.find(']'), Some(13));
    }

    #[test]
    fn test_append_line_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        append_line(&path, "first\n");
        append_line(&path, "second\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
