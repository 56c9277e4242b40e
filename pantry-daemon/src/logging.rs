//! Logging sink selection and subscriber installation.
//!
//! | log file | daemon | sinks           |
//! |----------|--------|-----------------|
//! | no       | no     | console         |
//! | yes      | no     | console + file  |
//! | yes      | yes    | file            |
//! | no       | yes    | none            |

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pantry_core::LogSettings;

use crate::error::{io_err, DaemonError};

/// Which sinks a process writes log events to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkPlan {
    pub console: bool,
    pub file: Option<PathBuf>,
}

impl SinkPlan {
    pub fn for_settings(settings: &LogSettings, daemonized: bool) -> Self {
        Self {
            console: !daemonized,
            file: settings.file.clone(),
        }
    }
}

/// Install the global subscriber. Later calls in the same process are no-ops.
pub fn init(settings: &LogSettings, daemonized: bool) -> Result<(), DaemonError> {
    let plan = SinkPlan::for_settings(settings, daemonized);
    let filter = EnvFilter::new(settings.level.filter_directive());

    let file_layer = match &plan.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| io_err(path, e))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let console_layer = plan.console.then(|| fmt::layer().with_target(false));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::LogLevel;

    fn settings(file: Option<&str>) -> LogSettings {
        LogSettings {
            level: LogLevel::Info,
            file: file.map(PathBuf::from),
        }
    }

    #[test]
    fn foreground_without_file_logs_to_console() {
        let plan = SinkPlan::for_settings(&settings(None), false);
        assert_eq!(plan, SinkPlan { console: true, file: None });
    }

    #[test]
    fn foreground_with_file_logs_to_both() {
        let plan = SinkPlan::for_settings(&settings(Some("/tmp/p.log")), false);
        assert!(plan.console);
        assert_eq!(plan.file, Some(PathBuf::from("/tmp/p.log")));
    }

    #[test]
    fn daemon_with_file_logs_to_file_only() {
        let plan = SinkPlan::for_settings(&settings(Some("/tmp/p.log")), true);
        assert!(!plan.console);
        assert!(plan.file.is_some());
    }

    #[test]
    fn daemon_without_file_is_silent() {
        let plan = SinkPlan::for_settings(&settings(None), true);
        assert_eq!(plan, SinkPlan { console: false, file: None });
    }
}
