/*
 * Driver Contract
 *
 * What the tty layer needs from whatever supplies its characters:
 * register a callback for decoded input, push a byte out, and mask/
 * unmask its own I/O around a buffer mutation. `ConsoleDriver` is the
 * one implementation this kernel ships, pairing the PS/2 keyboard
 * scancode decoder (input) with the 16550 UART (output).
 */

use crate::arch::x86_64::peripheral::keyboard;
use crate::io::device::Errno;
use crate::scheduler::ipl;

/// Consumed by the tty layer exactly as spec'd: a callback registration,
/// a byte sink, and a paired block/unblock token.
pub trait Driver: Send + Sync {
    fn register_callback_handler(&self, handler: fn(u8)) -> Result<(), Errno>;
    fn provide_char(&self, c: u8);
    /// Mask whatever interrupt source feeds this driver's input and
    /// return an opaque token capturing the previous state.
    fn block_io(&self) -> bool;
    fn unblock_io(&self, token: bool);
}

/// Keyboard-in, UART-out console driver.
pub struct ConsoleDriver;

impl ConsoleDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl Driver for ConsoleDriver {
    fn register_callback_handler(&self, handler: fn(u8)) -> Result<(), Errno> {
        keyboard::set_input_callback(handler);
        Ok(())
    }

    fn provide_char(&self, c: u8) {
        crate::arch::x86_64::peripheral::write_byte(c);
    }

    fn block_io(&self) -> bool {
        let was_enabled = ipl::are_enabled();
        ipl::disable();
        was_enabled
    }

    fn unblock_io(&self, token: bool) {
        if token {
            ipl::enable();
        }
    }
}
