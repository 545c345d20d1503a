/*
 * Debugging and Logging Utilities
 */

pub mod logger;

/// Initialize the serial port backing the `log` facade. Must run before
/// the first `log::info!`/etc. call anywhere in the kernel.
pub fn init_debug_infrastructure() {
    crate::arch::x86_64::peripheral::init_debug_port();
    logger::init(log::LevelFilter::Trace);
}
