use crate::shared::paths::{ensure_dir, get_log_dir};
use std::collections::HashMap;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log targets that get their own daily file. Everything else goes to `system.log`.
pub const ROUTED_TARGETS: [&str; 3] = ["store", "reminders", "summary"];

/// Guards that must be kept alive to ensure logs are flushed
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Multi-target writer that routes logs to different files based on target
struct TargetWriter {
    writers: HashMap<String, NonBlocking>,
    system_writer: NonBlocking,
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(self.system_writer.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        match route_target(meta.target()) {
            Some(name) => match self.writers.get(name) {
                Some(writer) => Box::new(writer.clone()),
                None => Box::new(self.system_writer.clone()),
            },
            None => Box::new(self.system_writer.clone()),
        }
    }
}

/// Maps a tracing target to the routed file it belongs to, if any.
fn route_target(target: &str) -> Option<&'static str> {
    ROUTED_TARGETS.into_iter().find(|name| {
        target == *name
            || target
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Initialize logging into the default log directory.
pub fn init_logging() -> std::io::Result<LoggingGuards> {
    init_logging_in(&get_log_dir())
}

/// Initialize the logging system with per-target daily log files in `log_dir`.
pub fn init_logging_in(log_dir: &Path) -> std::io::Result<LoggingGuards> {
    ensure_dir(log_dir)?;

    let mut guards = Vec::new();
    let mut writers = HashMap::new();

    for target in ROUTED_TARGETS {
        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        writers.insert(target.to_string(), non_blocking);
        guards.push(guard);
    }

    let system_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "system.log");
    let (system_writer, system_guard) = tracing_appender::non_blocking(system_appender);
    guards.push(system_guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(TargetWriter {
                writers,
                system_writer,
            })
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    tracing::info!(target: "system", "Logging initialized at {:?}", log_dir);

    Ok(LoggingGuards { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_target() {
        assert_eq!(route_target("store"), Some("store"));
        assert_eq!(route_target("reminders"), Some("reminders"));
        assert_eq!(route_target("summary::http"), Some("summary"));
        assert_eq!(route_target("storefront"), None);
        assert_eq!(route_target("system"), None);
        assert_eq!(route_target("todotips_lib::app"), None);
    }
}
