use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use relayout::settings::LogSettings;

/// Keeps the file writer flushing; drop it last.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Stderr always; a daily rolling file too when `settings.dir` is set.
/// `RUST_LOG` overrides the configured filter.
pub fn init(settings: &LogSettings) -> Option<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter.as_str()));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let (file_layer, guard) = match &settings.dir {
        Some(dir) => {
            if let Err(error) = std::fs::create_dir_all(dir) {
                eprintln!("cannot create log dir {}: {error}", dir.display());
                (None, None)
            } else {
                let file_appender = tracing_appender::rolling::daily(dir, "relayout.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    if subscriber.try_init().is_err() {
        return None;
    }

    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!(panic = %panic_info, "panic");
    }));

    let log_dir = guard.as_ref().and(settings.dir.clone());
    match &log_dir {
        Some(dir) => tracing::info!(log_dir = %dir.display(), "tracing initialized"),
        None => tracing::debug!("tracing initialized"),
    }

    Some(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}
