/*
 * Physical Frame Allocator
 *
 * Bitmap-based allocator for 4 KiB frames over a single flat region
 * reserved at boot by `init`. One bit per frame, 0 = free, 1 = used.
 */

use spin::Mutex;

use crate::memory::types::PhysFrame;

/// 256 MiB region at 4 KiB frames.
const MAX_FRAMES: usize = 64 * 1024;
const BITMAP_LEN: usize = MAX_FRAMES / 64;

struct Allocator {
    base: u64,
    bitmap: [u64; BITMAP_LEN],
}

static ALLOCATOR: Mutex<Allocator> = Mutex::new(Allocator {
    base: 0,
    bitmap: [u64::MAX; BITMAP_LEN],
});

/// Reserve `[base_phys_addr, base_phys_addr + MAX_FRAMES * 4096)` as the
/// allocator's frame pool, all initially free.
pub fn init(base_phys_addr: u64) {
    let mut a = ALLOCATOR.lock();
    a.base = base_phys_addr & !(PhysFrame::SIZE - 1);
    for w in a.bitmap.iter_mut() {
        *w = 0;
    }
    log::info!(
        "physical frame allocator: base=0x{:x} frames={}",
        a.base,
        MAX_FRAMES
    );
}

pub fn alloc_frame() -> Option<PhysFrame> {
    let mut a = ALLOCATOR.lock();
    for word_idx in 0..BITMAP_LEN {
        let word = a.bitmap[word_idx];
        if word != u64::MAX {
            let bit_idx = word.trailing_ones() as usize;
            a.bitmap[word_idx] = word | (1 << bit_idx);
            let frame_num = word_idx * 64 + bit_idx;
            if frame_num >= MAX_FRAMES {
                return None;
            }
            let addr = a.base + frame_num as u64 * PhysFrame::SIZE;
            return Some(PhysFrame::containing_address(addr));
        }
    }
    None
}

pub fn free_frame(frame: PhysFrame) {
    let mut a = ALLOCATOR.lock();
    let frame_num = ((frame.start_address() - a.base) / PhysFrame::SIZE) as usize;
    if frame_num < MAX_FRAMES {
        let word_idx = frame_num / 64;
        let bit_idx = frame_num % 64;
        a.bitmap[word_idx] &= !(1 << bit_idx);
    }
}

/// (used frames, total frames)
pub fn get_stats() -> (usize, usize) {
    let a = ALLOCATOR.lock();
    let used: usize = a.bitmap.iter().map(|w| w.count_ones() as usize).sum();
    (used, MAX_FRAMES)
}
