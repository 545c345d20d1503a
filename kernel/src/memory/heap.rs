/*
 * Kernel Heap Allocator
 *
 * Maps a fixed virtual range to freshly allocated physical frames, page
 * by page, then hands the mapped region to `linked_list_allocator` as
 * the global allocator.
 */

use linked_list_allocator::LockedHeap;

use crate::config::PAGE_SIZE;
use crate::memory::paging::{self, PageFlags, PageTableOps, X86PageTable};
use crate::memory::phys;

pub const HEAP_START: u64 = 0xffff_ffff_c000_0000;
pub const HEAP_SIZE: u64 = 8 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Map the kernel heap range and hand it to the allocator. Must be
/// called exactly once, after the physical frame allocator is ready.
pub fn init() -> Result<(), &'static str> {
    log::info!(
        "kernel heap: 0x{:x}-0x{:x} ({} KiB)",
        HEAP_START,
        HEAP_START + HEAP_SIZE - 1,
        HEAP_SIZE / 1024
    );

    let table = X86PageTable::new(paging::current_root());
    let page_count = HEAP_SIZE / PAGE_SIZE;
    let flags = PageFlags::PRESENT | PageFlags::WRITABLE;

    for i in 0..page_count {
        let virt = HEAP_START + i * PAGE_SIZE;
        let frame = phys::alloc_frame().ok_or("out of physical memory mapping kernel heap")?;
        table.map_page(virt, frame.start_address(), flags)?;
    }

    unsafe {
        ALLOCATOR
            .lock()
            .init(HEAP_START as *mut u8, HEAP_SIZE as usize);
    }

    log::info!("kernel heap initialized");
    Ok(())
}

#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap allocation failed: {:?}", layout);
}
