/*
 * Peripheral Device Management
 *
 * The hardware peripherals this kernel actually drives: the 16550 UART
 * (debug log sink and tty console output), the PS/2 keyboard (tty
 * console input), and the 8259 PIC (interrupt routing for both).
 */

use spin::Mutex;

use self::uart_16550::SerialPort;

pub mod keyboard;
pub mod pic;
pub mod uart_16550;

/// COM1, used both for early debug logging and tty console output.
pub static COM1: Mutex<SerialPort> = Mutex::new(SerialPort::new(0x3F8));

/// Initializes the debug port (COM1) for logging.
///
/// Must be called early in boot, before any logging occurs.
pub fn init_debug_port() {
    COM1.lock().init();
}

/// Initializes the remaining peripherals (PIC routing). Must run after
/// `init_debug_port` and before interrupts are enabled.
pub fn init_peripherals() {
    pic::init_pic();
    log::info!("PIC initialization complete");
}

/// Write a single raw byte to the console (COM1). Callers that need
/// control-character expansion (a bare `\n` to `\r\n`, backspace to an
/// erase sequence) must do it themselves before calling this — the tty
/// line discipline already does, and double-expanding here would garble
/// its output.
pub fn write_byte(b: u8) {
    COM1.lock().send(b);
}
