/*
 * Thread: the schedulable unit.
 *
 * State machine: no-state -> runnable (make_runnable) -> [running] ->
 * {sleeping | sleeping-cancellable} (sleep_on / cancellable_sleep_on) ->
 * runnable (wakeup_on / cancel) -> [running] -> ... -> exited.
 */

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use super::context::MachineContext;
use super::process::ProcessId;
use super::queue::WaitQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ThreadId(pub usize);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    NoState,
    Runnable,
    Sleeping,
    SleepingCancellable,
    Exited,
}

pub struct Thread {
    pub id: ThreadId,
    pub name: String,
    pub state: ThreadState,
    /// Sticky once set; observed by `cancellable_sleep_on` (returns EINTR
    /// immediately rather than blocking) and used by `cancel` to decide
    /// whether to yank a cancellable sleeper awake.
    pub cancelled: bool,
    /// The wait queue this thread is linked on, or `None` if runnable or
    /// exited. Non-owning: the queue owns the actual link node, this is
    /// only a back-reference for lookup (used by `cancel`).
    pub wait_channel: Option<Arc<WaitQueue>>,
    pub context: Box<MachineContext>,
    pub process_id: ProcessId,
    pub entry_fn: fn(),
    pub exit_code: Option<i32>,
    #[allow(dead_code)]
    stack: Box<[u8]>,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        name: String,
        process_id: ProcessId,
        entry_fn: fn(),
        trampoline: extern "C" fn() -> !,
        stack: Box<[u8]>,
    ) -> Self {
        let stack_top = stack.as_ptr() as u64 + stack.len() as u64;
        Self {
            id,
            name,
            state: ThreadState::NoState,
            cancelled: false,
            wait_channel: None,
            context: Box::new(MachineContext::new(trampoline, stack_top)),
            process_id,
            entry_fn,
            exit_code: None,
            stack,
        }
    }

    /// The pseudo-thread representing the kernel's boot-time execution
    /// context. Never enqueued on the run queue; exists only so the very
    /// first `switch` has somewhere to save the outgoing context.
    pub fn new_boot(id: ThreadId, process_id: ProcessId) -> Self {
        Self {
            id,
            name: String::from("kernel"),
            state: ThreadState::Runnable,
            cancelled: false,
            wait_channel: None,
            context: Box::new(MachineContext::idle()),
            process_id,
            entry_fn: || {},
            exit_code: None,
            stack: Box::new([]),
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
