/*
 * Memory Subsystem Tests
 *
 * S1-S6 from the VM fault path and heap-break manager's testable-
 * properties scenarios, plus the vmmap-disjointness, brk-success, and
 * brk-idempotent invariants. The page fault handler is exercised
 * directly (`pagefault::handle_pagefault`) rather than through a real
 * CPU #PF, since there is no way to induce one deterministically from a
 * self-test; this is the same boundary the syscall tests exercise
 * handlers at, one layer below the interrupt that would normally call
 * them.
 *
 * All tests share the one boot process (pid 0) the scheduler owns —
 * this kernel never builds a second address space — so every area an
 * individual test installs lives at its own disjoint page range to
 * avoid cross-test interference.
 */

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::config::PAGE_SIZE;
use crate::memory::object::{AnonObject, MemObject};
use crate::memory::pagefault::{self, FaultCause};
use crate::memory::types::page_of;
use crate::memory::vmmap::{Protection, VMArea};
use crate::scheduler::{self, ThreadId};

fn capture_driver() {
    DRIVER_TID.store(scheduler::current_thread_id().0, Ordering::SeqCst);
}

fn wake_driver() {
    scheduler::make_runnable(ThreadId(DRIVER_TID.load(Ordering::SeqCst)));
}

static DRIVER_TID: AtomicUsize = AtomicUsize::new(0);

fn install_area(page: u64, prot: Protection, obj: Arc<dyn MemObject>) {
    scheduler::with_current_process_mut(|process| {
        process
            .vmmap
            .insert(VMArea {
                start: page,
                end: page + 1,
                prot,
                offset: 0,
                obj,
            })
            .expect("test area must not collide with another test's range");
    });
}

/// S1: a read access to a page backed by a read-only area installs the
/// mapping without marking the frame dirty.
fn test_read_fault_installs_mapping() -> bool {
    const PAGE: u64 = 500_000;
    let obj = AnonObject::new();
    install_area(PAGE, Protection::READ, obj.clone());

    pagefault::handle_pagefault(PAGE * PAGE_SIZE, FaultCause::empty());

    let frame = obj.lookup(0, false).expect("frame must exist after fault");
    !frame.lock().is_dirty()
}

/// S2: a write access to a writable area installs the mapping and
/// marks the backing frame dirty.
fn test_write_fault_marks_dirty() -> bool {
    const PAGE: u64 = 500_001;
    let obj = AnonObject::new();
    install_area(PAGE, Protection::READ | Protection::WRITE, obj.clone());

    pagefault::handle_pagefault(PAGE * PAGE_SIZE, FaultCause::WRITE);

    let frame = obj.lookup(0, false).expect("frame must exist after fault");
    frame.lock().is_dirty()
}

static FAULT_VADDR: AtomicU64 = AtomicU64::new(0);
static FAULT_CAUSE: AtomicU8 = AtomicU8::new(0);

fn fault_and_die() {
    wake_driver();
    let vaddr = FAULT_VADDR.load(Ordering::SeqCst);
    let cause = FaultCause::from_bits_truncate(FAULT_CAUSE.load(Ordering::SeqCst));
    pagefault::handle_pagefault(vaddr, cause);
    unreachable!("handle_pagefault must diverge for an unrecoverable fault");
}

/// Run `fault_and_die` against (vaddr, cause) in a disposable thread and
/// return its exit code, or `None` if it somehow survived.
fn run_fault_to_death(vaddr: u64, cause: FaultCause) -> Option<i32> {
    capture_driver();
    FAULT_VADDR.store(vaddr, Ordering::SeqCst);
    FAULT_CAUSE.store(cause.bits(), Ordering::SeqCst);
    let pid = scheduler::kernel_process();
    let tid = scheduler::spawn_thread(fault_and_die, "fault_and_die", pid);
    scheduler::switch();
    scheduler::with_thread(tid, |t| t.exit_code).flatten()
}

/// S3: a write to a read-only area is an unrecoverable fault (EFAULT),
/// not a silent no-op.
fn test_write_to_readonly_is_fatal() -> bool {
    const PAGE: u64 = 500_002;
    let obj = AnonObject::new();
    install_area(PAGE, Protection::READ, obj);

    let exit_code = run_fault_to_death(PAGE * PAGE_SIZE, FaultCause::WRITE);
    exit_code == Some(128 + crate::io::device::Errno::EFAULT as i32)
}

/// S4: a fault at an address with no covering area is also EFAULT.
fn test_fault_with_no_area_is_fatal() -> bool {
    const PAGE: u64 = 500_100;
    let exit_code = run_fault_to_death(PAGE * PAGE_SIZE, FaultCause::empty());
    exit_code == Some(128 + crate::io::device::Errno::EFAULT as i32)
}

/// Invariant 4: vmmap areas are pairwise disjoint; `insert` rejects an
/// overlapping range and accepts an adjacent, non-overlapping one.
fn test_vmmap_areas_disjoint() -> bool {
    const BASE: u64 = 500_200;
    let a = scheduler::with_current_process_mut(|process| {
        process.vmmap.insert(VMArea {
            start: BASE,
            end: BASE + 10,
            prot: Protection::READ,
            offset: 0,
            obj: AnonObject::new(),
        })
    })
    .unwrap();

    let overlapping = scheduler::with_current_process_mut(|process| {
        process.vmmap.insert(VMArea {
            start: BASE + 5,
            end: BASE + 15,
            prot: Protection::READ,
            offset: 0,
            obj: AnonObject::new(),
        })
    })
    .unwrap();

    let adjacent = scheduler::with_current_process_mut(|process| {
        process.vmmap.insert(VMArea {
            start: BASE + 10,
            end: BASE + 20,
            prot: Protection::READ,
            offset: 0,
            obj: AnonObject::new(),
        })
    })
    .unwrap();

    a.is_ok() && overlapping.is_err() && adjacent.is_ok()
}

const HEAP_START_BRK: u64 = 0x0000_6000_0000;

fn init_test_heap() {
    scheduler::with_current_process_mut(|process| {
        process.start_brk = HEAP_START_BRK;
        process.brk = HEAP_START_BRK;
        let start_page = page_of(HEAP_START_BRK).0;
        if process.vmmap.lookup(start_page).is_none() {
            process
                .vmmap
                .insert(VMArea {
                    start: start_page,
                    end: start_page + 1,
                    prot: Protection::READ | Protection::WRITE,
                    offset: 0,
                    obj: AnonObject::new(),
                })
                .expect("initial heap area must not collide");
        }
    });
}

/// S5 / invariant 5: growing the break with free space ahead of it
/// succeeds, and `process.brk` plus the heap area's end agree with it.
fn test_brk_grow_with_space() -> bool {
    init_test_heap();
    let target = HEAP_START_BRK + 3 * PAGE_SIZE;
    let result = crate::memory::brk::brk(target);
    if result != Ok(target) {
        return false;
    }
    let start_page = page_of(HEAP_START_BRK).0;
    scheduler::with_current_process(|process| {
        process.brk == target && process.vmmap.lookup(start_page).map(|a| a.end) == Some(start_page + 3)
    })
    .unwrap_or(false)
}

/// S6: growing into a range another area already occupies fails with
/// ENOMEM and leaves the break untouched.
fn test_brk_grow_into_occupied_fails() -> bool {
    let start_page = page_of(HEAP_START_BRK).0;
    let before = scheduler::with_current_process(|process| process.brk).unwrap();

    scheduler::with_current_process_mut(|process| {
        process
            .vmmap
            .insert(VMArea {
                start: start_page + 20,
                end: start_page + 21,
                prot: Protection::READ,
                offset: 0,
                obj: AnonObject::new(),
            })
    })
    .unwrap()
    .expect("occupying area must not collide with the heap area itself");

    let target = HEAP_START_BRK + 25 * PAGE_SIZE;
    let result = crate::memory::brk::brk(target);
    let unchanged = scheduler::with_current_process(|process| process.brk == before).unwrap_or(false);

    result == Err(crate::io::device::Errno::ENOMEM) && unchanged
}

/// Invariant 6: querying the break with `brk(0)` never changes it.
fn test_brk_query_round_trips() -> bool {
    let first = crate::memory::brk::brk(0);
    let second = crate::memory::brk::brk(0);
    first.is_ok() && first == second
}

pub fn run() {
    crate::tests::record("S1: read fault installs a clean mapping", test_read_fault_installs_mapping());
    crate::tests::record("S2: write fault marks the frame dirty", test_write_fault_marks_dirty());
    crate::tests::record("S3: write to read-only area is fatal (EFAULT)", test_write_to_readonly_is_fatal());
    crate::tests::record("S4: fault with no covering area is fatal (EFAULT)", test_fault_with_no_area_is_fatal());
    crate::tests::record("invariant: vmmap areas are pairwise disjoint", test_vmmap_areas_disjoint());
    crate::tests::record("S5/invariant: brk grows into free space", test_brk_grow_with_space());
    crate::tests::record("S6: brk grow into occupied range -> ENOMEM", test_brk_grow_into_occupied_fails());
    crate::tests::record("invariant: brk(0) query round-trips", test_brk_query_round_trips());
}
