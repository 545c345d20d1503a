/*
 * Cooperative Kernel-Thread Scheduler
 *
 * A single run queue (itself a `WaitQueue`) and a handful of primitives
 * operating on it and on arbitrary other `WaitQueue`s: `sleep_on`,
 * `cancellable_sleep_on`, `wakeup_on`, `broadcast_on`, `cancel`,
 * `make_runnable`, and `switch`. There is no preemption, no timer-driven
 * context switch, and no multi-CPU support — a thread runs until it
 * voluntarily calls `switch` (directly, or through one of the sleep
 * primitives).
 *
 * All state lives behind one `Kernel` singleton, following the same
 * `Mutex<...>` + `lazy_static!` shape the rest of this kernel uses for
 * its other global tables.
 */

extern crate alloc;

pub mod context;
pub mod ipl;
pub mod process;
pub mod queue;
pub mod thread;

pub use ipl::{are_enabled, disable, enable, get_ipl, set_ipl, wait, Ipl, IplGuard};
pub use process::{Process, ProcessId};
pub use queue::WaitQueue;
pub use thread::{Thread, ThreadId, ThreadState};

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use context::MachineContext;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::THREAD_STACK_SIZE;
use crate::io::device::Errno;

struct Kernel {
    threads: BTreeMap<ThreadId, Thread>,
    processes: BTreeMap<ProcessId, Process>,
    run_queue: Arc<WaitQueue>,
    current: ThreadId,
    next_thread_id: usize,
    next_process_id: usize,
}

impl Kernel {
    fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
            processes: BTreeMap::new(),
            run_queue: Arc::new(WaitQueue::new()),
            current: ThreadId(0),
            next_thread_id: 1,
            next_process_id: 1,
        }
    }
}

lazy_static! {
    static ref KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
}

/// Set up the boot pseudo-process/thread (PID 0 / TID 0) that owns the
/// execution context `init` itself is running on, and become `current`.
pub fn init() {
    let mut kernel = KERNEL.lock();
    let boot_pid = ProcessId(0);
    let root = x86_64::PhysAddr::new(crate::memory::paging::current_root());
    kernel
        .processes
        .insert(boot_pid, Process::new(boot_pid, "kernel", root, 0));
    kernel.threads.insert(ThreadId(0), Thread::new_boot(ThreadId(0), boot_pid));
    kernel.current = ThreadId(0);
    log::info!("Scheduler initialized (cooperative, single-CPU)");
}

/// Create a process with no threads yet, for callers that want to spawn
/// more than one thread into it. Returns the default kernel process (PID
/// 0) for everyday test/boot-thread use.
pub fn kernel_process() -> ProcessId {
    ProcessId(0)
}

extern "C" fn thread_trampoline() -> ! {
    let tid = current_thread_id();
    let entry = KERNEL.lock().threads.get(&tid).map(|t| t.entry_fn);
    if let Some(entry) = entry {
        entry();
    }
    exit_current_thread(0);
}

/// Spawn a new thread running `entry` to completion inside `process_id`.
/// The thread starts in the no-state/not-runnable state; call
/// `make_runnable` to schedule it.
pub fn spawn_thread(entry: fn(), name: &str, process_id: ProcessId) -> ThreadId {
    let stack = alloc::vec![0u8; THREAD_STACK_SIZE].into_boxed_slice();

    let mut kernel = KERNEL.lock();
    let id = ThreadId(kernel.next_thread_id);
    kernel.next_thread_id += 1;

    let thread = Thread::new(id, String::from(name), process_id, entry, thread_trampoline, stack);
    kernel.threads.insert(id, thread);
    if let Some(process) = kernel.processes.get_mut(&process_id) {
        process.add_thread(id);
    }
    drop(kernel);

    make_runnable(id);
    id
}

pub fn current_thread_id() -> ThreadId {
    KERNEL.lock().current
}

/// Mark `t` runnable and enqueue it on the run queue. Used both by
/// ordinary thread-context callers (after creating a thread) and by
/// interrupt handlers (after an I/O event satisfies a waiter).
pub fn make_runnable(t: ThreadId) {
    let _guard = IplGuard::new();
    let mut kernel = KERNEL.lock();
    if let Some(thread) = kernel.threads.get_mut(&t) {
        thread.state = ThreadState::Runnable;
        thread.wait_channel = None;
    }
    let run_queue = kernel.run_queue.clone();
    drop(kernel);
    run_queue.enqueue(t);
    log::trace!("make_runnable: {}", t);
}

/// Block the current thread on `queue` until `wakeup_on`/`broadcast_on`
/// wakes it.
///
/// Precondition: the calling thread is not already linked on a queue.
pub fn sleep_on(queue: &Arc<WaitQueue>) {
    let tid = current_thread_id();
    {
        let _guard = IplGuard::new();
        let mut kernel = KERNEL.lock();
        if let Some(thread) = kernel.threads.get_mut(&tid) {
            debug_assert!(
                thread.wait_channel.is_none(),
                "sleep_on: thread already linked on a wait channel"
            );
            thread.state = ThreadState::Sleeping;
            thread.wait_channel = Some(queue.clone());
        }
        drop(kernel);
        queue.enqueue(tid);
    }
    switch();
}

/// Like `sleep_on`, but the sleep can be interrupted by `cancel`. Returns
/// `Err(EINTR)` immediately, without blocking, if the thread was already
/// cancelled; otherwise returns `Ok(())` whether woken ordinarily or via
/// cancellation — callers distinguish the two, if they need to, by
/// checking the thread's own cancellation state after return.
pub fn cancellable_sleep_on(queue: &Arc<WaitQueue>) -> Result<(), Errno> {
    let tid = current_thread_id();
    {
        let _guard = IplGuard::new();
        let mut kernel = KERNEL.lock();
        if kernel.threads.get(&tid).map(|t| t.cancelled).unwrap_or(false) {
            return Err(Errno::EINTR);
        }
        if let Some(thread) = kernel.threads.get_mut(&tid) {
            debug_assert!(
                thread.wait_channel.is_none(),
                "cancellable_sleep_on: thread already linked on a wait channel"
            );
            thread.state = ThreadState::SleepingCancellable;
            thread.wait_channel = Some(queue.clone());
        }
        drop(kernel);
        queue.enqueue(tid);
    }
    switch();
    Ok(())
}

/// Wake one thread from `queue` (FIFO order) and make it runnable.
pub fn wakeup_on(queue: &Arc<WaitQueue>) -> Option<ThreadId> {
    let _guard = IplGuard::new();
    let tid = queue.dequeue()?;
    let mut kernel = KERNEL.lock();
    if let Some(thread) = kernel.threads.get_mut(&tid) {
        thread.state = ThreadState::Runnable;
        thread.wait_channel = None;
    }
    let run_queue = kernel.run_queue.clone();
    drop(kernel);
    run_queue.enqueue(tid);
    log::trace!("wakeup_on: {}", tid);
    Some(tid)
}

/// Wake every thread currently on `queue`, in FIFO order.
pub fn broadcast_on(queue: &Arc<WaitQueue>) {
    let _guard = IplGuard::new();
    while let Some(tid) = queue.dequeue() {
        let mut kernel = KERNEL.lock();
        if let Some(thread) = kernel.threads.get_mut(&tid) {
            thread.state = ThreadState::Runnable;
            thread.wait_channel = None;
        }
        let run_queue = kernel.run_queue.clone();
        drop(kernel);
        run_queue.enqueue(tid);
    }
}

/// Mark `t` cancelled. If it is currently in a cancellable sleep, unlink
/// it from its wait channel and make it runnable immediately; an
/// ordinary (non-cancellable) sleeper is left alone until it wakes
/// normally.
pub fn cancel(t: ThreadId) {
    let _guard = IplGuard::new();
    let (was_cancellable, channel) = {
        let mut kernel = KERNEL.lock();
        match kernel.threads.get_mut(&t) {
            Some(thread) => {
                thread.cancelled = true;
                if thread.state == ThreadState::SleepingCancellable {
                    thread.state = ThreadState::Runnable;
                    (true, thread.wait_channel.take())
                } else {
                    (false, None)
                }
            }
            None => return,
        }
    };

    if was_cancellable {
        if let Some(channel) = &channel {
            channel.remove(t);
        }
        let mut kernel = KERNEL.lock();
        let run_queue = kernel.run_queue.clone();
        drop(kernel);
        run_queue.enqueue(t);
        log::debug!("cancel: woke {} from cancellable sleep", t);
    }
}

/// Terminate the calling thread, marking it exited, unlinking it from
/// the run queue, and switching away. Never returns.
pub fn exit_current_thread(exit_code: i32) -> ! {
    let tid = current_thread_id();
    {
        let _guard = IplGuard::new();
        let mut kernel = KERNEL.lock();
        let process_id = kernel.threads.get(&tid).map(|t| t.process_id);
        if let Some(thread) = kernel.threads.get_mut(&tid) {
            log::info!("Thread {} ({}) exiting with code {}", tid.0, thread.name, exit_code);
            thread.state = ThreadState::Exited;
            thread.exit_code = Some(exit_code);
        }
        if let Some(pid) = process_id {
            if let Some(process) = kernel.processes.get_mut(&pid) {
                process.remove_thread(tid);
            }
        }
        let run_queue = kernel.run_queue.clone();
        drop(kernel);
        run_queue.remove(tid);
    }
    switch();
    unreachable!("exited thread {} resumed after switch", tid);
}

/// The scheduling core. Blocks (lowering IPL and halting) while the run
/// queue is empty, then context-switches into the thread at its head.
/// `switch` itself performs the IPL raise/lower dance around run-queue
/// access; callers do not need to wrap it.
pub fn switch() {
    let saved = Ipl::raise();

    let next = loop {
        if let Some(tid) = KERNEL.lock().run_queue.clone().dequeue() {
            break tid;
        }
        enable();
        wait();
        disable();
    };

    let prev = {
        let mut kernel = KERNEL.lock();
        let prev = kernel.current;
        kernel.current = next;
        if let Some(thread) = kernel.threads.get_mut(&next) {
            thread.state = ThreadState::Runnable;
        }
        prev
    };

    if prev != next {
        let (prev_ctx, next_ctx) = {
            let mut kernel = KERNEL.lock();
            let prev_ptr = kernel
                .threads
                .get_mut(&prev)
                .map(|t| &mut *t.context as *mut MachineContext);
            let next_ptr = kernel
                .threads
                .get(&next)
                .map(|t| &*t.context as *const MachineContext);
            (prev_ptr, next_ptr)
        };

        if let (Some(prev_ptr), Some(next_ptr)) = (prev_ctx, next_ctx) {
            unsafe {
                context::switch_to(prev_ptr, next_ptr);
            }
        }
    }

    saved.restore();
}

/// Run `f` with read access to the current thread's owning process.
pub fn with_current_process<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let kernel = KERNEL.lock();
    let pid = kernel.threads.get(&kernel.current)?.process_id;
    kernel.processes.get(&pid).map(f)
}

/// Run `f` with mutable access to the current thread's owning process.
pub fn with_current_process_mut<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut Process) -> R,
{
    let mut kernel = KERNEL.lock();
    let pid = kernel.threads.get(&kernel.current)?.process_id;
    kernel.processes.get_mut(&pid).map(f)
}

/// Run `f` with read access to an arbitrary thread, by id.
pub fn with_thread<F, R>(tid: ThreadId, f: F) -> Option<R>
where
    F: FnOnce(&Thread) -> R,
{
    KERNEL.lock().threads.get(&tid).map(f)
}

/// Number of threads currently tracked by the scheduler (including
/// exited-but-not-yet-reaped ones). Used by tests to assert that exiting
/// a thread does not leak an entry in the run queue.
pub fn thread_count() -> usize {
    KERNEL.lock().threads.len()
}

pub fn run_queue_len() -> usize {
    KERNEL.lock().run_queue.len()
}
