/*
 * Scheduler Tests
 *
 * S7-S9 from the scheduler's testable-properties scenarios, plus the
 * wait-channel/current-thread/idempotent-cancel invariants. Each test
 * thread is spawned into the kernel's boot process and hands control
 * back to the driver explicitly: `switch` never re-enqueues the thread
 * that called it, so the last thread in a test's chain always calls
 * `make_runnable` on the driver's own id before finishing.
 */

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::scheduler::{self, ThreadId, ThreadState, WaitQueue};
use crate::tests::record;

static DRIVER_TID: AtomicUsize = AtomicUsize::new(0);

fn capture_driver() {
    DRIVER_TID.store(scheduler::current_thread_id().0, Ordering::SeqCst);
}

fn wake_driver() {
    scheduler::make_runnable(ThreadId(DRIVER_TID.load(Ordering::SeqCst)));
}

static ORDER: [AtomicUsize; 3] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];
static ORDER_NEXT: AtomicUsize = AtomicUsize::new(0);

fn order_thread_0() {
    ORDER[0].store(ORDER_NEXT.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
}
fn order_thread_1() {
    ORDER[1].store(ORDER_NEXT.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
}
fn order_thread_2() {
    ORDER[2].store(ORDER_NEXT.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
    // Last thread in the chain: hand the CPU back to the driver.
    wake_driver();
}

/// S7: three threads made runnable in order run in that same FIFO order.
fn test_fifo_order() -> bool {
    ORDER_NEXT.store(0, Ordering::SeqCst);
    capture_driver();
    let pid = scheduler::kernel_process();
    scheduler::spawn_thread(order_thread_0, "fifo_test_0", pid);
    scheduler::spawn_thread(order_thread_1, "fifo_test_1", pid);
    scheduler::spawn_thread(order_thread_2, "fifo_test_2", pid);
    scheduler::switch();
    ORDER[0].load(Ordering::SeqCst) == 1
        && ORDER[1].load(Ordering::SeqCst) == 2
        && ORDER[2].load(Ordering::SeqCst) == 3
}

static CANCEL_WOKE: AtomicUsize = AtomicUsize::new(0);
static CANCEL_SLEEPER_TID: AtomicUsize = AtomicUsize::new(0);

fn cancellable_sleeper(queue: &Arc<WaitQueue>) {
    let _ = scheduler::cancellable_sleep_on(queue);
    CANCEL_WOKE.store(1, Ordering::SeqCst);
    wake_driver();
}

fn canceller_thread() {
    scheduler::cancel(ThreadId(CANCEL_SLEEPER_TID.load(Ordering::SeqCst)));
}

/// S8: cancelling a thread already in cancellable sleep unlinks it from
/// the queue and makes it runnable; its cancelled flag ends up set.
///
/// The sleeper is spawned first (so it runs first, FIFO), blocks inside
/// `cancellable_sleep_on`, which switches to the canceller (spawned
/// second); the canceller cancels it and exits, handing control back to
/// the now-runnable sleeper, which records the result and wakes the
/// driver.
fn test_cancel_wakes_sleeper() -> bool {
    let queue = Arc::new(WaitQueue::new());
    CANCEL_WOKE.store(0, Ordering::SeqCst);
    capture_driver();

    static Q: spin::Mutex<Option<Arc<WaitQueue>>> = spin::Mutex::new(None);
    *Q.lock() = Some(queue.clone());

    fn trampoline() {
        let q = Q.lock().clone().unwrap();
        cancellable_sleeper(&q);
    }

    let pid = scheduler::kernel_process();
    let tid = scheduler::spawn_thread(trampoline, "cancel_sleeper", pid);
    CANCEL_SLEEPER_TID.store(tid.0, Ordering::SeqCst);
    scheduler::spawn_thread(canceller_thread, "canceller", pid);

    scheduler::switch();

    let unlinked = queue.len() == 0;
    let woke = CANCEL_WOKE.load(Ordering::SeqCst) == 1;
    let cancelled_flag = scheduler::with_thread(tid, |t| t.cancelled).unwrap_or(false);
    unlinked && woke && cancelled_flag
}

static PRECANCELLED_ENTERED: AtomicUsize = AtomicUsize::new(0);
static PRECANCELLED_RESULT_IS_EINTR: AtomicUsize = AtomicUsize::new(0);

fn precancelled_thread() {
    PRECANCELLED_ENTERED.store(1, Ordering::SeqCst);
    let q = Arc::new(WaitQueue::new());
    let result = scheduler::cancellable_sleep_on(&q);
    PRECANCELLED_RESULT_IS_EINTR.store(if result.is_err() { 1 } else { 0 }, Ordering::SeqCst);
    wake_driver();
}

/// S9: cancelling a thread before it ever sleeps makes its next
/// `cancellable_sleep_on` return EINTR immediately, without blocking.
fn test_cancel_before_sleep() -> bool {
    PRECANCELLED_ENTERED.store(0, Ordering::SeqCst);
    PRECANCELLED_RESULT_IS_EINTR.store(0, Ordering::SeqCst);
    capture_driver();

    let pid = scheduler::kernel_process();
    let tid = scheduler::spawn_thread(precancelled_thread, "precancelled", pid);
    scheduler::cancel(tid);
    // Runs to completion in one shot: cancellable_sleep_on sees the
    // cancelled flag already set and returns EINTR without blocking.
    scheduler::switch();

    PRECANCELLED_ENTERED.load(Ordering::SeqCst) == 1
        && PRECANCELLED_RESULT_IS_EINTR.load(Ordering::SeqCst) == 1
}

/// Invariant 1 & 3: outside `switch`, the current thread is runnable
/// with no wait channel.
fn test_current_thread_invariant() -> bool {
    let tid = scheduler::current_thread_id();
    scheduler::with_thread(tid, |t| t.state == ThreadState::Runnable && t.wait_channel.is_none())
        .unwrap_or(false)
}

/// Invariant 7: cancelling an already-cancelled thread is a no-op.
fn test_cancel_idempotent() -> bool {
    capture_driver();
    let pid = scheduler::kernel_process();
    let tid = scheduler::spawn_thread(precancelled_thread, "idempotent_cancel", pid);
    scheduler::cancel(tid);
    scheduler::cancel(tid);
    scheduler::switch();
    scheduler::with_thread(tid, |t| t.cancelled).unwrap_or(false)
}

pub fn run() {
    record("S7: make_runnable order is FIFO across switch", test_fifo_order());
    record("S8: cancel wakes a cancellable sleeper", test_cancel_wakes_sleeper());
    record("S9: cancel before sleep returns EINTR without blocking", test_cancel_before_sleep());
    record("invariant: current thread is runnable, unlinked", test_current_thread_invariant());
    record("invariant: cancel(t); cancel(t) is idempotent", test_cancel_idempotent());
}
