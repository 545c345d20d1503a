/*
 * Interrupt Priority Level
 *
 * The run queue and every wait queue are shared between thread context
 * and interrupt context (interrupt handlers call `make_runnable` and
 * `wakeup_on` directly). Every public mutator in this module raises IPL
 * to HIGH for the duration of its queue access and restores the saved
 * level afterward. `Ipl` and `IplGuard` are the two shapes that pattern
 * takes: `Ipl` is the explicit save/restore token `switch` needs (the
 * restore happens on a different thread's stack, after a context
 * switch, so it cannot be a single RAII guard); `IplGuard` is the RAII
 * wrapper for everything else.
 */

use x86_64::instructions::interrupts;

/// Enable interrupts globally.
pub fn enable() {
    interrupts::enable();
}

/// Disable interrupts globally.
pub fn disable() {
    interrupts::disable();
}

/// True if interrupts are currently enabled.
pub fn are_enabled() -> bool {
    interrupts::are_enabled()
}

/// Current IPL, expressed as "interrupts enabled".
pub fn get_ipl() -> bool {
    are_enabled()
}

/// Explicitly set IPL.
pub fn set_ipl(enabled: bool) {
    if enabled {
        enable();
    } else {
        disable();
    }
}

/// Halt the CPU until the next interrupt. Atomic with respect to the
/// surrounding IPL transition in the sense that the caller has already
/// lowered IPL before calling this, so the halted CPU can take the
/// interrupt it's waiting for.
pub fn wait() {
    x86_64::instructions::hlt();
}

/// An explicit save/restore token: disables interrupts on creation,
/// remembers whether they were enabled, and restores that state when
/// `restore` is called. Used where the restore cannot be tied to a
/// lexical scope (e.g. `switch`, whose outgoing context resumes on a
/// different call stack).
pub struct Ipl(bool);

impl Ipl {
    /// Raise to HIGH, saving the previous level.
    pub fn raise() -> Self {
        let were_enabled = are_enabled();
        if were_enabled {
            disable();
        }
        Self(were_enabled)
    }

    /// Restore the previously saved level.
    pub fn restore(self) {
        if self.0 {
            enable();
        }
    }
}

/// RAII critical section: disables interrupts for its lifetime and
/// restores the previous state on drop. This is the idiom every public
/// queue mutator uses internally.
pub struct IplGuard {
    were_enabled: bool,
}

impl IplGuard {
    pub fn new() -> Self {
        let were_enabled = are_enabled();
        if were_enabled {
            disable();
        }
        Self { were_enabled }
    }
}

impl Default for IplGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IplGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            enable();
        }
    }
}
