/*
 * Page Fault Handler
 *
 * Looks up the faulting page in the current process's vmmap, checks the
 * access against the area's protection, resolves the backing frame
 * through the memory-object contract, and installs the mapping. The
 * path never returns an error to its caller: it either installs a
 * mapping and returns, or kills the process (`do_exit`, divergent) and
 * never returns.
 */

use bitflags::bitflags;

use crate::config::PAGE_SIZE;
use crate::io::device::Errno;
use crate::memory::paging::{PageFlags, PageTableOps, X86PageTable};
use crate::memory::types::page_of;
use crate::memory::vmmap::Protection;
use crate::scheduler;

bitflags! {
    #[derive(Clone, Copy, Debug)]
    pub struct FaultCause: u8 {
        const WRITE = 1 << 0;
        const USER  = 1 << 1;
        const EXEC  = 1 << 2;
    }
}

pub fn handle_pagefault(vaddr: u64, cause: FaultCause) {
    let pagenum = page_of(vaddr).0;
    let write_fault = cause.contains(FaultCause::WRITE);
    let exec_fault = cause.contains(FaultCause::EXEC);

    let lookup = scheduler::with_current_process(|process| {
        let area = process.vmmap.lookup(pagenum)?;
        let permitted = area.prot.contains(Protection::READ)
            && (!write_fault || area.prot.contains(Protection::WRITE))
            && (!exec_fault || area.prot.contains(Protection::EXEC));
        if !permitted {
            return None;
        }
        let obj_index = pagenum - area.start + area.offset;
        Some((area.obj.clone(), obj_index))
    });

    let (obj, obj_index) = match lookup {
        Some(Some(pair)) => pair,
        _ => {
            log::error!("page fault at 0x{:x}: no mapped, permitted area ({:?})", vaddr, cause);
            do_exit(Errno::EFAULT);
        }
    };

    let frame = match obj.lookup(obj_index, write_fault) {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("page fault at 0x{:x}: backing object lookup failed: {:?}", vaddr, e);
            do_exit(Errno::EFAULT);
        }
    };

    if write_fault {
        crate::memory::object::dirty(&mut frame.lock());
    }

    let phys_addr = frame.lock().phys.start_address();
    let virt_addr = pagenum * PAGE_SIZE;

    let mut flags = PageFlags::PRESENT | PageFlags::USER;
    if write_fault {
        flags |= PageFlags::WRITABLE;
    }

    let root = crate::memory::paging::current_root();
    let table = X86PageTable::new(root);
    if let Err(e) = table.map_page(virt_addr, phys_addr, flags) {
        log::error!("page fault at 0x{:x}: failed to install mapping: {}", vaddr, e);
        do_exit(Errno::EFAULT);
    }
}

/// Terminate the current thread for an unrecoverable fault. Never returns.
fn do_exit(err: Errno) -> ! {
    log::error!("process terminated on unrecoverable fault: {:?}", err);
    scheduler::exit_current_thread(128 + err as i32);
}
