/*
 * Line Discipline
 *
 * Canonical-mode line editing between the driver's raw character stream
 * and the tty's read/write syscalls: `receive_char` buffers input and
 * produces an echo string, `process_char` expands an output byte (e.g.
 * `\n` -> `\r\n`), and `read` blocks on a wait queue until a full line
 * (or EOF) is buffered.
 */

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::scheduler::{self, WaitQueue};

const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;

struct State {
    canonical: bool,
    echo: bool,
    buf: VecDeque<u8>,
    /// Number of complete (newline-terminated) lines currently in `buf`,
    /// ahead of whatever has already been drained by `read`.
    lines_ready: usize,
}

pub struct LineDiscipline {
    state: Mutex<State>,
    ready: Arc<WaitQueue>,
}

impl LineDiscipline {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                canonical: true,
                echo: true,
                buf: VecDeque::new(),
                lines_ready: 0,
            }),
            ready: Arc::new(WaitQueue::new()),
        }
    }

    pub fn set_canonical(&self, canonical: bool) {
        self.state.lock().canonical = canonical;
    }

    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Feed one raw input byte. Returns the echo string to send back to
    /// the driver (possibly empty).
    pub fn receive_char(&self, c: u8) -> Vec<u8> {
        let mut st = self.state.lock();
        let echo = st.echo;

        if st.canonical && (c == b'\r' || c == b'\n') {
            st.buf.push_back(b'\n');
            st.lines_ready += 1;
            drop(st);
            scheduler::wakeup_on(&self.ready);
            return if echo { alloc::vec![b'\r', b'\n'] } else { Vec::new() };
        }

        if st.canonical && (c == BACKSPACE || c == DEL) {
            // Never erase past the start of the line currently being typed.
            if st.buf.back().copied() != Some(b'\n') && st.buf.pop_back().is_some() {
                return if echo {
                    alloc::vec![BACKSPACE, b' ', BACKSPACE]
                } else {
                    Vec::new()
                };
            }
            return Vec::new();
        }

        st.buf.push_back(c);
        if !st.canonical {
            st.lines_ready += 1;
            drop(st);
            scheduler::wakeup_on(&self.ready);
        }
        if echo { alloc::vec![c] } else { Vec::new() }
    }

    /// Expand one output byte for the write path.
    pub fn process_char(&self, c: u8) -> Vec<u8> {
        if c == b'\n' {
            alloc::vec![b'\r', b'\n']
        } else {
            alloc::vec![c]
        }
    }

    /// Block until at least one line (canonical mode) or one byte (raw
    /// mode) is available, then copy up to `buf.len()` bytes out.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        loop {
            {
                let mut st = self.state.lock();
                let have_data = if st.canonical {
                    st.lines_ready > 0
                } else {
                    !st.buf.is_empty()
                };
                if have_data {
                    let mut n = 0;
                    while n < buf.len() {
                        match st.buf.pop_front() {
                            Some(b) => {
                                buf[n] = b;
                                n += 1;
                                if st.canonical && b == b'\n' {
                                    st.lines_ready -= 1;
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    return n;
                }
            }
            scheduler::sleep_on(&self.ready);
        }
    }
}

impl Default for LineDiscipline {
    fn default() -> Self {
        Self::new()
    }
}
