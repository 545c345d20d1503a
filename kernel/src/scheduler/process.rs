/*
 * Process
 *
 * The process lifecycle itself (fork/exec, wait/reap, loading) is an
 * external collaborator per this kernel's scope boundary; what the core
 * needs from a process is its address-space map, its page-directory
 * handle, and the start-brk/brk pair the heap manager operates on.
 */

use alloc::string::String;
use alloc::vec::Vec;
use x86_64::PhysAddr;

use super::thread::ThreadId;
use crate::io::fd::FileDescriptorTable;
use crate::memory::vmmap::Vmmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub usize);

pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub fd_table: FileDescriptorTable,
    pub threads: Vec<ThreadId>,
    pub vmmap: Vmmap,
    pub page_directory: PhysAddr,
    /// Immutable once the address space is built.
    pub start_brk: u64,
    /// Current heap end; always >= start_brk.
    pub brk: u64,
}

impl Process {
    pub fn new(id: ProcessId, name: &str, page_directory: PhysAddr, start_brk: u64) -> Self {
        Self {
            id,
            name: String::from(name),
            fd_table: FileDescriptorTable::new(),
            threads: Vec::new(),
            vmmap: Vmmap::new(),
            page_directory,
            start_brk,
            brk: start_brk,
        }
    }

    pub fn add_thread(&mut self, tid: ThreadId) {
        self.threads.push(tid);
    }

    pub fn remove_thread(&mut self, tid: ThreadId) {
        self.threads.retain(|&t| t != tid);
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("thread_count", &self.threads.len())
            .field("brk", &self.brk)
            .finish()
    }
}
