/*
 * TTY Device
 *
 * Pairs a `Driver` (console input/output) with a `LineDiscipline` to
 * implement the `Device` trait's read/write contract for a terminal.
 * Only one tty exists in this kernel (tty0 / the console), so the
 * input callback the driver dispatches from interrupt context is a
 * plain fn pointer routed through a single global instance.
 */

use alloc::sync::Arc;
use spin::Mutex;

use super::device::{Device, Errno, Stat, S_IFCHR};
use super::driver::Driver;
use super::line_discipline::LineDiscipline;
use crate::config::TTY_MAJOR;

const TCGETS: u32 = 0x5401;
const TCSETS: u32 = 0x5402;

pub struct Tty {
    id: u8,
    driver: Arc<dyn Driver>,
    ldisc: LineDiscipline,
}

static TTY0: Mutex<Option<Arc<Tty>>> = Mutex::new(None);

impl Tty {
    /// Allocate a tty device, install `driver`, and register the input
    /// callback that feeds its line discipline. Only one instance may be
    /// live at a time (the callback routes through a single global).
    pub fn create(driver: Arc<dyn Driver>, id: u8) -> Result<Arc<Self>, Errno> {
        let tty = Arc::new(Self {
            id,
            driver,
            ldisc: LineDiscipline::new(),
        });
        *TTY0.lock() = Some(tty.clone());
        tty.driver.register_callback_handler(tty_input_callback)?;
        log::info!("tty{} ({}, {}) created", id, TTY_MAJOR, id);
        Ok(tty)
    }
}

/// Invoked by the driver from interrupt context on each decoded keypress.
fn tty_input_callback(c: u8) {
    if let Some(tty) = TTY0.lock().as_ref() {
        let echo = tty.ldisc.receive_char(c);
        for b in echo {
            tty.driver.provide_char(b);
        }
    }
}

impl Device for Tty {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        if buf.is_empty() {
            return Ok(0);
        }
        let token = self.driver.block_io();
        let n = self.ldisc.read(buf);
        self.driver.unblock_io(token);
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Errno> {
        let token = self.driver.block_io();
        let mut n = 0;
        for &c in buf {
            if c == 0 {
                break;
            }
            n += 1;
            for out in self.ldisc.process_char(c) {
                self.driver.provide_char(out);
            }
        }
        self.driver.unblock_io(token);
        Ok(n)
    }

    fn ioctl(&self, request: u32, arg: usize) -> Result<i32, Errno> {
        match request {
            TCGETS => Ok(0),
            TCSETS => {
                // Minimal termios subset: bit 0 of `arg` selects canonical
                // vs. raw mode, bit 1 selects echo. A real implementation
                // would copy a `struct termios` in from user memory.
                self.ldisc.set_canonical(arg & 0x1 != 0);
                self.ldisc.set_echo(arg & 0x2 != 0);
                Ok(0)
            }
            _ => Err(Errno::EINVAL),
        }
    }

    fn is_tty(&self) -> bool {
        true
    }

    fn stat(&self) -> Stat {
        Stat {
            st_mode: S_IFCHR | 0o666,
            st_size: 0,
            st_blksize: 0,
            st_blocks: 0,
        }
    }

    fn seek(&self, _offset: i64, _whence: i32) -> Result<i64, Errno> {
        Err(Errno::ESPIPE)
    }
}
