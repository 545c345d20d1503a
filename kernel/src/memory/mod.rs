/*
 * Memory Management
 *
 * Ties together the physical frame allocator, page tables, kernel
 * heap, per-process virtual memory maps, memory objects, the page
 * fault handler, and the brk heap-break manager.
 */

pub mod brk;
pub mod heap;
pub mod object;
pub mod pagefault;
pub mod paging;
pub mod phys;
pub mod types;
pub mod vmmap;

/// Physical base address for the frame pool this kernel manages. Chosen
/// to sit above the kernel image's own load region.
const PHYS_POOL_BASE: u64 = 0x0100_0000; // 16 MiB

/// Top-level memory initialization:
///  1. Physical frame allocator over a fixed flat region
///  2. Kernel heap, mapped through the current (bootstrap) page table
pub fn init() {
    log::info!("initializing memory management");

    phys::init(PHYS_POOL_BASE);
    heap::init().expect("failed to initialize kernel heap");

    let (used, total) = phys::get_stats();
    log::info!("physical memory: used={} total={} frames", used, total);
}
