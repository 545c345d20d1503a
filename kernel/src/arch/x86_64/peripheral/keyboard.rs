/*
 * PS/2 Keyboard Driver
 *
 * This module provides a PS/2 keyboard driver using the pc_keyboard crate
 * for reliable scancode decoding. It handles keyboard interrupts and provides
 * a way to read characters from the kernel.
 *
 * Features:
 * - Uses pc_keyboard crate for robust scancode decoding
 * - Support for multiple keyboard layouts
 * - No heap allocation required
 * - Simple character buffer for kernel input
 * - Full modifier key support (Shift, Ctrl, Alt)
 */

use pc_keyboard::{DecodedKey, HandleControl, Keyboard, ScancodeSet1, layouts};
use spin::Mutex;
use x86_64::instructions::port::Port;

/// PS/2 keyboard data port
const KEYBOARD_DATA_PORT: u16 = 0x60;

/// Simple circular buffer for keyboard input
const BUFFER_SIZE: usize = 64;

pub struct KeyboardBuffer {
    buffer: [char; BUFFER_SIZE],
    read_pos: usize,
    write_pos: usize,
    count: usize,
}

impl KeyboardBuffer {
    const fn new() -> Self {
        Self {
            buffer: ['\0'; BUFFER_SIZE],
            read_pos: 0,
            write_pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, ch: char) {
        if self.count < BUFFER_SIZE {
            self.buffer[self.write_pos] = ch;
            self.write_pos = (self.write_pos + 1) % BUFFER_SIZE;
            self.count += 1;
        }
    }

    fn pop(&mut self) -> Option<char> {
        if self.count > 0 {
            let ch = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % BUFFER_SIZE;
            self.count -= 1;
            Some(ch)
        } else {
            None
        }
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Global keyboard buffer and decoder
static KEYBOARD_BUFFER: Mutex<KeyboardBuffer> = Mutex::new(KeyboardBuffer::new());
static KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(Keyboard::new(
    ScancodeSet1::new(),
    layouts::Us104Key,
    HandleControl::Ignore,
));

/// Decoded-character callback registered by the console driver. Invoked
/// directly from interrupt context, once per decoded keypress.
static INPUT_CALLBACK: Mutex<Option<fn(u8)>> = Mutex::new(None);

/// Register the callback the tty layer's driver wants scancode-decoded
/// bytes delivered to. Only one callback is supported (single console).
pub fn set_input_callback(handler: fn(u8)) {
    *INPUT_CALLBACK.lock() = Some(handler);
}

/// Handle keyboard interrupt
pub fn handle_keyboard_interrupt() {
    let mut keyboard_port = Port::new(KEYBOARD_DATA_PORT);
    let scancode = unsafe { keyboard_port.read() };

    let mut keyboard = KEYBOARD.lock();

    if let Ok(Some(key_event)) = keyboard.add_byte(scancode) {
        if let Some(key) = keyboard.process_keyevent(key_event) {
            match key {
                DecodedKey::Unicode(character) => {
                    if let Some(cb) = *INPUT_CALLBACK.lock() {
                        cb(character as u8);
                    } else {
                        KEYBOARD_BUFFER.lock().push(character);
                    }
                }
                DecodedKey::RawKey(key) => {
                    log::trace!("unhandled raw key: {:?}", key);
                }
            }
        }
    }
}
