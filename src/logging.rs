//! Process-wide logging setup.
//!
//! Lines look like `2024-03-10 08:05:00 - phone_shamer - INFO - message` and
//! go to stdout, plus the configured log file when one is set. A log file that
//! cannot be opened leaves console-only logging and a warning. `RUST_LOG` still
//! overrides the configured level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use chrono::Local;

use crate::config::LoggingSettings;

const LOGGER_NAME: &str = "phone_shamer";

/// Duplicates every write into two sinks.
pub struct TeeWriter<A: Write, B: Write> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

/// Install the global logger. Fails only if a logger is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(settings.level.as_str());
    let mut builder = env_logger::Builder::from_env(env);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            LOGGER_NAME,
            record.level(),
            record.args()
        )
    });

    let file_error = match settings.file.as_deref().map(open_log_file) {
        Some(Ok(file)) => {
            builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(
                io::stdout(),
                file,
            ))));
            None
        }
        Some(Err(e)) => {
            builder.target(env_logger::Target::Stdout);
            Some(e)
        }
        None => {
            builder.target(env_logger::Target::Stdout);
            None
        }
    };

    builder
        .try_init()
        .map_err(|e| anyhow!("logger already initialised: {}", e))?;

    if let Some(e) = file_error {
        log::warn!("file logging disabled, console only: {:#}", e);
    }
    Ok(())
}

/// Open `path` for appending, creating missing parent directories.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log dir {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_writes_to_both_sinks() -> Result<()> {
        let mut tee = TeeWriter::new(Vec::new(), Vec::new());
        tee.write_all(b"hello\n")?;
        tee.flush()?;
        assert_eq!(tee.primary, b"hello\n");
        assert_eq!(tee.secondary, b"hello\n");
        Ok(())
    }

    #[test]
    fn open_log_file_creates_parent_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs").join("shamer.log");
        open_log_file(&path)?;
        assert!(path.exists());
        Ok(())
    }

    // The only test in this crate that installs the global logger.
    #[test]
    fn unopenable_log_file_falls_back_to_console() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"")?;
        let path = blocker.join("shamer.log");
        assert!(open_log_file(&path).is_err());

        let settings = LoggingSettings {
            level: "info".to_string(),
            file: Some(path.clone()),
        };
        init_logging(&settings)?;
        assert!(!path.exists());
        Ok(())
    }
}
