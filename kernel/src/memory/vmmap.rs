/*
 * Virtual Memory Area Map
 *
 * Per-process map of page-number ranges to the memory object backing
 * them. Areas never overlap; `insert` enforces that invariant.
 */

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;

use crate::io::device::Errno;
use crate::memory::object::MemObject;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Protection: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

/// A contiguous range of virtual pages `[start, end)` backed by `obj`,
/// starting at object-relative page `offset`.
pub struct VMArea {
    pub start: u64,
    pub end: u64,
    pub prot: Protection,
    pub offset: u64,
    pub obj: Arc<dyn MemObject>,
}

impl VMArea {
    pub fn contains(&self, page: u64) -> bool {
        page >= self.start && page < self.end
    }
}

pub struct Vmmap {
    areas: Vec<VMArea>,
}

impl Vmmap {
    pub const fn new() -> Self {
        Self { areas: Vec::new() }
    }

    pub fn lookup(&self, page: u64) -> Option<&VMArea> {
        self.areas.iter().find(|a| a.contains(page))
    }

    pub fn lookup_mut(&mut self, page: u64) -> Option<&mut VMArea> {
        self.areas.iter_mut().find(|a| a.contains(page))
    }

    /// True if no existing area intersects `[start, end)`.
    pub fn is_range_empty(&self, start: u64, end: u64) -> bool {
        !self.areas.iter().any(|a| a.start < end && start < a.end)
    }

    /// Insert a new area. Fails with `EINVAL` if it overlaps an existing one.
    pub fn insert(&mut self, area: VMArea) -> Result<(), Errno> {
        if !self.is_range_empty(area.start, area.end) {
            return Err(Errno::EINVAL);
        }
        self.areas.push(area);
        Ok(())
    }
}

impl Default for Vmmap {
    fn default() -> Self {
        Self::new()
    }
}
