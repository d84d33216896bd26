//! Logging setup for the bridge.
//!
//! Installs `env_logger` as the `log` backend. Without a log directory the
//! output goes to stderr; with one it goes to a daily file with size-based
//! rotation and cleanup of old files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::InteropConfig;

/// Maximum log file size before rotation (5MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of log files to keep
const MAX_LOG_FILES: usize = 5;

const LOG_FILE_PREFIX: &str = "dxgl_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingOptions {
    /// `env_logger` filter string. Falls back to `RUST_LOG`, then `info`.
    pub filter: Option<String>,
    pub directory: Option<PathBuf>,
}

impl LoggingOptions {
    pub fn from_config(config: &InteropConfig) -> Self {
        Self {
            filter: config.log_level.clone(),
            directory: config.log_directory.clone(),
        }
    }
}

/// Install the global logger. Returns `false` if a logger was already set.
pub fn init_logging(options: &LoggingOptions) -> io::Result<bool> {
    let mut builder = env_logger::Builder::new();
    match options.filter.as_deref() {
        Some(filter) => builder.parse_filters(filter),
        None => match std::env::var("RUST_LOG") {
            Ok(filter) => builder.parse_filters(&filter),
            Err(_) => builder.filter_level(log::LevelFilter::Info),
        },
    };

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(dir) = options.directory.as_deref() {
        let file = RotatingLogFile::open(dir)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    let installed = builder.try_init().is_ok();
    if installed {
        log::info!("[INTEROP] Logging initialized");
        if let Some(dir) = options.directory.as_deref() {
            log::info!("[INTEROP] Log directory: {:?}", dir);
        }
    }
    Ok(installed)
}

/// Path for the current log file (one per day).
fn current_log_path(log_dir: &Path) -> PathBuf {
    let date = Local::now().format("%Y-%m-%d");
    log_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, date))
}

/// Remove old log files, keeping only the most recent `MAX_LOG_FILES`.
fn cleanup_old_logs(log_dir: &Path) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
            })
            .collect();

        // Newest first
        log_files.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        for file in log_files.into_iter().skip(MAX_LOG_FILES) {
            let _ = fs::remove_file(file.path());
        }
    }
}

/// Append-only daily log file that rotates once it grows past `max_size`.
pub struct RotatingLogFile {
    dir: PathBuf,
    path: PathBuf,
    file: File,
    written: u64,
    max_size: u64,
}

impl RotatingLogFile {
    pub fn open(dir: &Path) -> io::Result<Self> {
        Self::with_max_size(dir, MAX_LOG_SIZE)
    }

    fn with_max_size(dir: &Path, max_size: u64) -> io::Result<Self> {
        Self::open_path(dir, current_log_path(dir), max_size)
    }

    fn open_path(dir: &Path, path: PathBuf, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let (file, written) = open_append(&path)?;
        cleanup_old_logs(dir);
        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            file,
            written,
            max_size,
        })
    }

    /// The file currently being appended to.
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    fn switch_to(&mut self, path: PathBuf) -> io::Result<()> {
        let (file, written) = open_append(&path)?;
        self.file = file;
        self.written = written;
        self.path = path;
        cleanup_old_logs(&self.dir);
        Ok(())
    }

    /// Move the open file aside and start today's file.
    fn rotate(&mut self) -> io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S%.3f");
        let rotated = self
            .dir
            .join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp));
        fs::rename(&self.path, rotated)?;
        self.switch_to(current_log_path(&self.dir))
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The logger cannot log its own failures; they go to stderr and the
        // current file stays open.
        let today = current_log_path(&self.dir);
        if today != self.path {
            if let Err(e) = self.switch_to(today) {
                eprintln!("[INTEROP] Failed to open new daily log file: {}", e);
            }
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        if self.written > self.max_size {
            if let Err(e) = self.rotate() {
                eprintln!("[INTEROP] Failed to rotate log file {:?}: {}", self.path, e);
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
