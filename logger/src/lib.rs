use std::path::PathBuf;

use chrono::Utc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

/// `LogKind` represents the kind of logging: `stdout` or `logfile`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// It logs to console, the default choice.
    STDOUT,

    /// It logs on a file in the temp directory, `tdmi-<timestamp>.log`.
    FILE,
}

/// Keeps the background writer alive. Dropping it flushes pending lines.
pub struct LoggerGuard {
    _guard: WorkerGuard,
    path: Option<PathBuf>,
}

impl LoggerGuard {
    /// Log file, when logging to [`LogKind::FILE`].
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. A second call keeps the first subscriber.
///
/// # Errors
///
/// Fails only if the log file can't be created.
pub fn init_logger(kind: LogKind) -> std::io::Result<LoggerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard, path) = match kind {
        LogKind::STDOUT => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            (writer, guard, None)
        }
        LogKind::FILE => {
            let filename = format!("tdmi-{}.log", Utc::now().timestamp_micros());
            let path = std::env::temp_dir().join(filename);
            let file = std::fs::File::create(&path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (writer, guard, Some(path))
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(kind == LogKind::STDOUT)
        .try_init()
        .ok();

    if let Some(path) = &path {
        tracing::info!("logging to {}", path.display());
    }

    Ok(LoggerGuard {
        _guard: guard,
        path,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{LogKind, init_logger};

    #[test]
    fn logger_file() {
        let guard = init_logger(LogKind::FILE).unwrap();
        let path = guard.path().cloned().unwrap();
        tracing::info!("ok");
        // Dropping the guard flushes the background writer.
        drop(guard);

        let s = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(path.to_str().unwrap().contains("tdmi-"));
        assert!(s.contains("INFO"));
        assert!(s.trim_end().ends_with("ok"));
    }
}
