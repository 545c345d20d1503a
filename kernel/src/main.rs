/*
 * Kernel Entry Point
 *
 * A bare-metal x86_64 kernel image: a flat BSP stack set up in assembly
 * before anything else runs, then a Rust entry point that brings up
 * logging, the GDT/IDT, memory management, the scheduler, and the
 * console tty, runs the boot-time self-tests, and falls into the idle
 * loop. There is no multi-core support and no userspace process
 * loader — this kernel's boot process (pid 0) is the only process that
 * ever exists, and its threads are the kernel-internal workers the
 * scheduler and self-tests spawn.
 */

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;

use alloc::sync::Arc;
use core::panic::PanicInfo;

mod arch;
mod config;
mod io;
mod memory;
mod scheduler;
mod syscall;
mod tests;
mod utils;

#[repr(C, align(16))]
pub struct AlignedBspStack([u8; 64 * 1024]);

#[unsafe(no_mangle)]
pub static mut BSP_STACK: AlignedBspStack = AlignedBspStack([0; 64 * 1024]);

/// Entry point the bootloader jumps to. Switches off whatever stack it
/// handed us onto our own, then calls into Rust.
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "lea rax, [rip + BSP_STACK]",
        "add rax, {stack_size}",
        "mov rsp, rax",
        "jmp kstart",
        stack_size = const 64 * 1024,
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn kstart() -> ! {
    utils::debug::init_debug_infrastructure();
    log::info!("kernel starting");

    arch::x86_64::gdt::init();
    // Must run before memory::init() switches CR3: an exception during
    // that switch with no IDT installed is a triple fault.
    arch::x86_64::idt::init();

    memory::init();

    scheduler::init();
    arch::x86_64::peripheral::init_peripherals();

    let console = io::Tty::create(Arc::new(io::ConsoleDriver::new()), 0)
        .expect("console tty must be the first tty created");
    scheduler::with_current_process_mut(|process| {
        process.fd_table.insert(0, console.clone());
        process.fd_table.insert(1, console.clone());
        process.fd_table.insert(2, console);
    });

    x86_64::instructions::interrupts::enable();
    log::info!("interrupts enabled");

    let (passed, failed) = tests::run_all();
    if failed > 0 {
        log::error!("{} self-test(s) failed", failed);
    } else {
        log::info!("all {} self-tests passed", passed);
    }

    log::info!("entering idle loop");
    loop {
        x86_64::instructions::hlt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();

    if let Some(location) = info.location() {
        log::error!("panic at {}:{}: {}", location.file(), location.line(), info.message());
    } else {
        log::error!("panic: {}", info.message());
    }

    loop {
        x86_64::instructions::hlt();
    }
}
