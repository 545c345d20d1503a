/*
 * Machine Context
 *
 * The context switch is modeled as a single opaque primitive with a
 * narrow contract: save the outgoing thread's callee-saved registers and
 * stack pointer, load the incoming thread's. Everything above this line
 * is expressed in safe abstractions; this is the one unsafe boundary the
 * rest of the scheduler is built on.
 */

#[repr(C)]
pub struct MachineContext {
    rsp: u64,
}

impl MachineContext {
    /// Build a context that, the first time it is switched into, starts
    /// executing `entry` on a fresh stack ending at `stack_top`.
    pub fn new(entry: extern "C" fn() -> !, stack_top: u64) -> Self {
        unsafe {
            let mut sp = stack_top as *mut u64;
            sp = sp.sub(1);
            sp.write(entry as u64);
            // `switch_to` pops 6 callee-saved registers before its `ret`;
            // reserve the slots it expects. Their contents are never read
            // since this context has not run yet.
            sp = sp.sub(6);
            Self { rsp: sp as u64 }
        }
    }

    /// Placeholder used only as the write target for the very first
    /// `switch_to` call (the boot thread's outgoing context). Never read.
    pub fn idle() -> Self {
        Self { rsp: 0 }
    }
}

/// Save callee-saved registers and the stack pointer from `*prev`, then
/// load them from `*next` and resume there.
///
/// # Safety
/// `prev` and `next` must point to distinct, valid `MachineContext`s.
/// `next` must have been produced by [`MachineContext::new`], or have
/// previously been a `prev` target of `switch_to`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_to(prev: *mut MachineContext, next: *const MachineContext) {
    core::arch::naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}
