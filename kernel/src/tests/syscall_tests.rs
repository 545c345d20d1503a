/*
 * Syscall Handler Tests
 *
 * Validates the syscall handlers from kernel mode by calling them
 * directly, exercising error paths that don't require a userspace
 * pointer (kernel-mode test threads have none to offer) plus the brk
 * growth/query paths against the boot process's real heap area.
 */

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::scheduler::{self, ThreadId};
use crate::syscall::handlers::*;
use crate::syscall::numbers::*;
use crate::tests::record;

// `switch` never re-enqueues the thread that called it, so both tests
// below that drive a helper thread through `switch` capture the
// driver's own id first and have the helper hand control back before
// it finishes.
static DRIVER_TID: AtomicUsize = AtomicUsize::new(0);

fn capture_driver() {
    DRIVER_TID.store(scheduler::current_thread_id().0, Ordering::SeqCst);
}

fn wake_driver() {
    scheduler::make_runnable(ThreadId(DRIVER_TID.load(Ordering::SeqCst)));
}

pub fn test_sys_write_invalid_fd() -> bool {
    let message = b"should not be written\n";
    sys_write(999, message.as_ptr(), message.len()) == -EBADF
}

pub fn test_sys_write_null_pointer() -> bool {
    sys_write(1, core::ptr::null(), 10) == -EFAULT
}

pub fn test_sys_write_kernel_pointer() -> bool {
    let kernel_addr = 0xffff_8000_0000_0000usize as *const u8;
    sys_write(1, kernel_addr, 10) == -EFAULT
}

pub fn test_sys_isatty_invalid_fd() -> bool {
    sys_isatty(999) == -EBADF
}

pub fn test_sys_fstat_null_pointer() -> bool {
    sys_fstat(1, core::ptr::null_mut()) == -EFAULT
}

pub fn test_sys_lseek_tty() -> bool {
    sys_lseek(1, 0, 0) == -ESPIPE
}

pub fn test_sys_close_invalid_fd() -> bool {
    sys_close(999) == -EBADF
}

pub fn test_sys_brk_query() -> bool {
    sys_brk(core::ptr::null_mut()) > 0
}

pub fn test_sys_brk_growth() -> bool {
    let current = sys_brk(core::ptr::null_mut());
    if current < 0 {
        return false;
    }
    let new_brk = (current as usize + 4096 * 4) as *mut u8;
    let result = sys_brk(new_brk);
    result == new_brk as isize && sys_brk(core::ptr::null_mut()) == result
}

/// Per the resolved heap-break contract (see DESIGN.md), an address
/// below `start_brk` is `-ENOMEM`, not `-EINVAL`.
pub fn test_sys_brk_invalid_low() -> bool {
    let invalid_brk = 0x1000usize as *mut u8;
    sys_brk(invalid_brk) == -ENOMEM
}

pub fn test_sys_brk_invalid_high() -> bool {
    let invalid_brk = 0x5000_0000usize as *mut u8;
    sys_brk(invalid_brk) == -ENOMEM
}

fn yield_helper_thread() {
    wake_driver();
}

pub fn test_sys_yield() -> bool {
    capture_driver();
    let pid = scheduler::kernel_process();
    // Without another runnable thread, `switch` inside sys_yield would
    // block forever waiting for an interrupt (there is no timer here).
    scheduler::spawn_thread(yield_helper_thread, "yield_helper", pid);
    sys_yield() == 0
}

fn exit_test_thread() {
    wake_driver();
    sys_exit(42);
}

pub fn test_sys_exit() -> bool {
    capture_driver();
    let pid = scheduler::kernel_process();
    let tid = scheduler::spawn_thread(exit_test_thread, "exit_test", pid);
    scheduler::switch();
    scheduler::with_thread(tid, |t| t.exit_code) == Some(Some(42))
}

pub fn run_all_syscall_tests() {
    record("sys_write: invalid fd -> EBADF", test_sys_write_invalid_fd());
    record("sys_write: null pointer -> EFAULT", test_sys_write_null_pointer());
    record("sys_write: kernel pointer -> EFAULT", test_sys_write_kernel_pointer());
    record("sys_isatty: invalid fd -> EBADF", test_sys_isatty_invalid_fd());
    record("sys_fstat: null pointer -> EFAULT", test_sys_fstat_null_pointer());
    record("sys_lseek: tty -> ESPIPE", test_sys_lseek_tty());
    record("sys_close: invalid fd -> EBADF", test_sys_close_invalid_fd());

    record("sys_brk: query", test_sys_brk_query());
    record("sys_brk: growth round-trips", test_sys_brk_growth());
    record("sys_brk: below start_brk -> ENOMEM", test_sys_brk_invalid_low());
    record("sys_brk: above USER_MEM_HIGH -> ENOMEM", test_sys_brk_invalid_high());

    record("sys_yield: returns 0", test_sys_yield());
    record("sys_exit: thread exits with its status", test_sys_exit());
}
