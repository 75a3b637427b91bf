use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::println;

/// `Log` implementation for serial
pub struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Self::LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!(
            "[{}:{}] {}: {}",
            record.file().unwrap_or("???"),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// The static logger
pub static LOGGER: SerialLogger = SerialLogger;

impl SerialLogger {
    #[cfg(debug_assertions)]
    const LEVEL: Level = Level::Trace;
    #[cfg(debug_assertions)]
    const LEVEL_FILTER: LevelFilter = LevelFilter::Trace;

    #[cfg(not(debug_assertions))]
    const LEVEL: Level = Level::Info;
    #[cfg(not(debug_assertions))]
    const LEVEL_FILTER: LevelFilter = LevelFilter::Info;

    /// Installs the logger. Later calls are ignored.
    pub fn init(&'static self) {
        if log::set_logger(self).is_ok() {
            log::set_max_level(Self::LEVEL_FILTER);
        }
    }
}
