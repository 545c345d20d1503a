/*
 * Serial Logger
 *
 * A `log::Log` implementation that writes formatted records to the
 * debug UART. Installed once at boot via `log::set_logger`.
 */

use core::fmt::Write;
use log::{Level, LevelFilter, Log, Metadata, Record};

struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.bytes() {
            crate::arch::x86_64::peripheral::write_byte(b);
        }
        Ok(())
    }
}

struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let _ = writeln!(
            SerialWriter,
            "[{}] {}: {}",
            level,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install the serial logger as the `log` facade's global logger.
/// Must be called exactly once, after the UART is initialized.
pub fn init(max_level: LevelFilter) {
    log::set_max_level(max_level);
    let _ = log::set_logger(&LOGGER);
}
