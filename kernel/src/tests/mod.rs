/*
 * Boot-Time Self-Test Suite
 *
 * Every suite here runs inline in the boot thread after the scheduler,
 * memory manager, and tty are up. There is no timer, so a test thread
 * that needs to hand control back to the driver (this module's caller)
 * must explicitly `make_runnable` the driver's thread id before it lets
 * itself be descheduled — `switch` never re-enqueues the thread that
 * called it, only whichever thread a queue operation names.
 */

pub mod memory_tests;
pub mod scheduler_tests;
pub mod syscall_tests;

use core::sync::atomic::{AtomicUsize, Ordering};

static PASSED: AtomicUsize = AtomicUsize::new(0);
static FAILED: AtomicUsize = AtomicUsize::new(0);

pub fn record(name: &str, ok: bool) {
    if ok {
        PASSED.fetch_add(1, Ordering::Relaxed);
        log::info!("[PASS] {}", name);
    } else {
        FAILED.fetch_add(1, Ordering::Relaxed);
        log::error!("[FAIL] {}", name);
    }
}

/// Run every suite and return `(passed, failed)`.
pub fn run_all() -> (usize, usize) {
    PASSED.store(0, Ordering::Relaxed);
    FAILED.store(0, Ordering::Relaxed);

    log::info!("=== Running kernel self-tests ===");
    scheduler_tests::run();
    memory_tests::run();
    syscall_tests::run_all_syscall_tests();

    let passed = PASSED.load(Ordering::Relaxed);
    let failed = FAILED.load(Ordering::Relaxed);
    log::info!("=== Self-tests complete: {} passed, {} failed ===", passed, failed);
    (passed, failed)
}
