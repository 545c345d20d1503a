/*
 * Page Table Management
 *
 * x86_64 4-level paging: PML4 -> PDPT -> PD -> PT -> 4K page, each level
 * 512 entries. Physical memory is identity-mapped in this kernel's
 * address space layout, so a page table's physical address doubles as
 * a valid pointer to it — no separate physical-memory window is
 * needed to walk or build tables.
 */

use bitflags::bitflags;

use crate::memory::phys;
use crate::memory::types::PhysFrame;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const NO_EXECUTE = 1 << 63;
    }
}

#[repr(transparent)]
#[derive(Clone, Copy)]
struct Entry(u64);

const ADDR_MASK: u64 = 0x000f_ffff_ffff_f000;

impl Entry {
    fn addr(&self) -> u64 {
        self.0 & ADDR_MASK
    }

    fn is_present(&self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    fn set(&mut self, addr: u64, flags: PageFlags) {
        self.0 = (addr & ADDR_MASK) | flags.bits();
    }

    fn clear(&mut self) {
        self.0 = 0;
    }
}

#[repr(align(4096))]
struct Table {
    entries: [Entry; 512],
}

impl Table {
    fn zero(&mut self) {
        for e in &mut self.entries {
            e.clear();
        }
    }
}

fn indices(virt: u64) -> (usize, usize, usize, usize) {
    (
        ((virt >> 39) & 0x1ff) as usize,
        ((virt >> 30) & 0x1ff) as usize,
        ((virt >> 21) & 0x1ff) as usize,
        ((virt >> 12) & 0x1ff) as usize,
    )
}

unsafe fn table_at<'a>(phys_addr: u64) -> &'a mut Table {
    unsafe { &mut *(phys_addr as *mut Table) }
}

/// Operations on a single page table hierarchy. Abstracted behind a
/// trait so the fault handler and heap initializer don't depend on the
/// concrete x86_64 entry format directly.
pub trait PageTableOps {
    fn map_page(&self, virt: u64, phys: u64, flags: PageFlags) -> Result<(), &'static str>;
    fn unmap_page(&self, virt: u64) -> Result<u64, &'static str>;
}

pub struct X86PageTable {
    root: u64,
}

impl X86PageTable {
    pub fn new(root: u64) -> Self {
        Self { root }
    }

    fn ensure_next(&self, table: &mut Table, idx: usize, user: bool) -> Result<u64, &'static str> {
        if table.entries[idx].is_present() {
            return Ok(table.entries[idx].addr());
        }
        let frame = phys::alloc_frame().ok_or("out of memory allocating page table")?;
        let addr = frame.start_address();
        unsafe { table_at(addr).zero() };
        let mut flags = PageFlags::PRESENT | PageFlags::WRITABLE;
        if user {
            flags |= PageFlags::USER;
        }
        table.entries[idx].set(addr, flags);
        Ok(addr)
    }
}

impl PageTableOps for X86PageTable {
    fn map_page(&self, virt: u64, phys: u64, flags: PageFlags) -> Result<(), &'static str> {
        let virt = virt & !0xfff;
        let phys = phys & !0xfff;
        let (pml4_i, pdpt_i, pd_i, pt_i) = indices(virt);
        let user = flags.contains(PageFlags::USER);

        let pml4 = unsafe { table_at(self.root) };
        let pdpt_addr = self.ensure_next(pml4, pml4_i, user)?;
        let pdpt = unsafe { table_at(pdpt_addr) };
        let pd_addr = self.ensure_next(pdpt, pdpt_i, user)?;
        let pd = unsafe { table_at(pd_addr) };
        let pt_addr = self.ensure_next(pd, pd_i, user)?;
        let pt = unsafe { table_at(pt_addr) };

        // Re-faulting an already-mapped page (e.g. a write fault upgrading
        // a read-only mapping) updates the entry in place rather than
        // erroring, matching `unmap_page`'s present-check pattern below.
        pt.entries[pt_i].set(phys, flags | PageFlags::PRESENT);
        flush(virt);
        Ok(())
    }

    fn unmap_page(&self, virt: u64) -> Result<u64, &'static str> {
        let virt = virt & !0xfff;
        let (pml4_i, pdpt_i, pd_i, pt_i) = indices(virt);

        let pml4 = unsafe { table_at(self.root) };
        if !pml4.entries[pml4_i].is_present() {
            return Err("page not mapped");
        }
        let pdpt = unsafe { table_at(pml4.entries[pml4_i].addr()) };
        if !pdpt.entries[pdpt_i].is_present() {
            return Err("page not mapped");
        }
        let pd = unsafe { table_at(pdpt.entries[pdpt_i].addr()) };
        if !pd.entries[pd_i].is_present() {
            return Err("page not mapped");
        }
        let pt = unsafe { table_at(pd.entries[pd_i].addr()) };
        if !pt.entries[pt_i].is_present() {
            return Err("page not mapped");
        }

        let phys = pt.entries[pt_i].addr();
        pt.entries[pt_i].clear();
        flush(virt);
        Ok(phys)
    }
}

fn flush(virt: u64) {
    use x86_64::{instructions::tlb, VirtAddr};
    tlb::flush(VirtAddr::new(virt));
}

/// Physical address of the currently loaded PML4 (read from CR3).
pub fn current_root() -> u64 {
    use x86_64::registers::control::Cr3;
    let (frame, _) = Cr3::read();
    frame.start_address().as_u64()
}

/// Allocate a new, zeroed PML4 for a fresh address space.
pub fn alloc_root() -> Result<u64, &'static str> {
    let frame = phys::alloc_frame().ok_or("out of memory allocating PML4")?;
    let addr = frame.start_address();
    unsafe { table_at(addr).zero() };
    Ok(addr)
}

/// Free a page previously mapped with `map_page`, returning its frame
/// to the physical allocator.
pub fn unmap_and_free(table: &X86PageTable, virt: u64) -> Result<(), &'static str> {
    let phys_addr = table.unmap_page(virt)?;
    phys::free_frame(PhysFrame::containing_address(phys_addr));
    Ok(())
}
