/*!
Defines a super simple logger that works with the `log` crate.

We don't do anything fancy. We just need basic log levels and the ability to
print to stderr. We therefore avoid bringing in extra dependencies just for
this functionality.
*/

use log::{LevelFilter, Log, Metadata, Record};

/// The simplest possible logger that logs to stderr.
#[derive(Debug)]
pub struct Logger(());

/// A singleton used as the target for an implementation of the `Log` trait.
const LOGGER: &Logger = &Logger(());

/// Create a new logger that logs to stderr and initialize it as the global
/// logger.
///
/// The maximum level defaults to `info` and can be overridden through the
/// `LOG_LEVEL` environment variable (`error`, `warn`, `info`, `debug`,
/// `trace`).
pub fn init() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    log::set_logger(LOGGER).expect("Failed to set logger");
    log::set_max_level(level);
}

impl Log for Logger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{}|{}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
