/*
 * Heap-Break Manager
 *
 * Implements the `brk(addr)` contract: `addr == 0` queries the current
 * break; otherwise the heap area is grown or shrunk to end exactly at
 * `addr`'s containing page.
 */

use crate::config::USER_MEM_HIGH;
use crate::io::device::Errno;
use crate::memory::types::page_of;
use crate::scheduler;

pub fn brk(addr: u64) -> Result<u64, Errno> {
    scheduler::with_current_process_mut(|process| {
        if addr == 0 {
            return Ok(process.brk);
        }
        if addr < process.start_brk || addr >= USER_MEM_HIGH {
            return Err(Errno::ENOMEM);
        }
        if addr == process.brk {
            return Ok(addr);
        }

        let start_page = page_of(process.start_brk).0;
        let new_end_page = page_of(addr - 1).0 + 1;

        let current_end = process
            .vmmap
            .lookup(start_page)
            .expect("heap area must exist once start_brk is set")
            .end;

        if new_end_page > current_end && !process.vmmap.is_range_empty(current_end, new_end_page) {
            return Err(Errno::ENOMEM);
        }

        let area = process
            .vmmap
            .lookup_mut(start_page)
            .expect("heap area must exist once start_brk is set");
        area.end = new_end_page;
        process.brk = addr;
        Ok(addr)
    })
    .unwrap_or(Err(Errno::ENOMEM))
}
