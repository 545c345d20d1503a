/*
 * Interrupt Descriptor Table (IDT)
 *
 * CPU exception handlers (entries 0-31), plus the two hardware IRQs
 * this kernel actually services: IRQ1 (keyboard) and IRQ4 (serial).
 * There is no timer IRQ handler and no software yield interrupt — this
 * kernel's scheduler is purely cooperative, so nothing drives a context
 * switch from interrupt context.
 */

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

/// Send End of Interrupt (EOI) signal to PIC.
///
/// For IRQs 0-7 (master PIC), only master EOI is needed. For IRQs 8-15
/// (slave PIC), both slave and master EOI are needed.
unsafe fn pic_eoi(irq: u8) {
    use x86_64::instructions::port::Port;

    if irq >= 8 {
        unsafe { Port::<u8>::new(0xA0).write(0x20) };
    }
    unsafe { Port::<u8>::new(0x20).write(0x20) };
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.debug.set_handler_fn(debug_handler);
        idt.non_maskable_interrupt.set_handler_fn(nmi_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.bound_range_exceeded.set_handler_fn(bound_range_exceeded_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.device_not_available.set_handler_fn(device_not_available_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(crate::arch::x86_64::gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt.invalid_tss.set_handler_fn(invalid_tss_handler);
        idt.segment_not_present.set_handler_fn(segment_not_present_handler);
        idt.stack_segment_fault.set_handler_fn(stack_segment_fault_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.x87_floating_point.set_handler_fn(x87_floating_point_handler);
        idt.alignment_check.set_handler_fn(alignment_check_handler);
        idt.machine_check.set_handler_fn(machine_check_handler);
        idt.simd_floating_point.set_handler_fn(simd_floating_point_handler);
        idt.virtualization.set_handler_fn(virtualization_handler);
        idt.security_exception.set_handler_fn(security_exception_handler);

        // Hardware interrupts (IRQ 0-15 map to interrupts 32-47).
        idt[33].set_handler_fn(keyboard_interrupt_handler); // IRQ 1 - keyboard
        idt[36].set_handler_fn(serial_interrupt_handler);   // IRQ 4 - serial COM1
        idt[39].set_handler_fn(serial_interrupt_handler);   // IRQ 7 - serial COM2

        idt
    };
}

/// Must be called early in boot, before interrupts are enabled.
pub fn init() {
    IDT.load();
    log::info!("IDT loaded");
}

extern "x86-interrupt" fn divide_error_handler(_stack_frame: InterruptStackFrame) {
    log::error!("divide error");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn debug_handler(_stack_frame: InterruptStackFrame) {
    log::warn!("debug exception");
}

extern "x86-interrupt" fn nmi_handler(_stack_frame: InterruptStackFrame) {
    log::error!("non-maskable interrupt");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn breakpoint_handler(_stack_frame: InterruptStackFrame) {
    log::warn!("breakpoint");
}

extern "x86-interrupt" fn overflow_handler(_stack_frame: InterruptStackFrame) {
    log::error!("overflow exception");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn bound_range_exceeded_handler(_stack_frame: InterruptStackFrame) {
    log::error!("bound range exceeded");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn invalid_opcode_handler(_stack_frame: InterruptStackFrame) {
    log::error!("invalid opcode");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn device_not_available_handler(_stack_frame: InterruptStackFrame) {
    log::error!("device not available");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn double_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    log::error!("double fault");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn invalid_tss_handler(_stack_frame: InterruptStackFrame, _error_code: u64) {
    log::error!("invalid TSS");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn segment_not_present_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    log::error!("segment not present");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn stack_segment_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    log::error!("stack segment fault");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn general_protection_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    log::error!("general protection fault");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use crate::memory::pagefault::{handle_pagefault, FaultCause};
    use x86_64::registers::control::Cr2;

    let fault_addr = match Cr2::read() {
        Ok(addr) => addr,
        Err(_) => {
            log::error!("page fault: CR2 holds an invalid address");
            panic!("invalid page fault address in CR2");
        }
    };

    if !error_code.contains(PageFaultErrorCode::USER_MODE) {
        log::error!(
            "kernel-mode page fault at {:?}, ip={:?}, error_code={:?}",
            fault_addr,
            stack_frame.instruction_pointer,
            error_code
        );
        panic!("page fault in kernel mode");
    }

    let mut cause = FaultCause::USER;
    if error_code.contains(PageFaultErrorCode::CAUSED_BY_WRITE) {
        cause |= FaultCause::WRITE;
    }
    if error_code.contains(PageFaultErrorCode::INSTRUCTION_FETCH) {
        cause |= FaultCause::EXEC;
    }

    log::debug!(
        "page fault at {:?}, ip={:?}, error_code={:?}",
        fault_addr,
        stack_frame.instruction_pointer,
        error_code
    );

    // Either installs a mapping and returns, or kills the faulting
    // thread and never returns.
    handle_pagefault(fault_addr.as_u64(), cause);
}

extern "x86-interrupt" fn x87_floating_point_handler(_stack_frame: InterruptStackFrame) {
    log::error!("x87 floating point exception");
    panic!("x87 floating point exception");
}

extern "x86-interrupt" fn alignment_check_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    log::error!("alignment check exception");
    panic!("alignment check exception");
}

extern "x86-interrupt" fn machine_check_handler(_stack_frame: InterruptStackFrame) -> ! {
    log::error!("machine check exception");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn simd_floating_point_handler(_stack_frame: InterruptStackFrame) {
    log::error!("SIMD floating point exception");
    panic!("SIMD floating point exception");
}

extern "x86-interrupt" fn virtualization_handler(_stack_frame: InterruptStackFrame) {
    log::error!("virtualization exception");
    panic!("virtualization exception");
}

extern "x86-interrupt" fn security_exception_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    log::error!("security exception");
    panic!("security exception");
}

extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    crate::arch::x86_64::peripheral::keyboard::handle_keyboard_interrupt();
    unsafe {
        pic_eoi(1);
    }
}

extern "x86-interrupt" fn serial_interrupt_handler(_stack_frame: InterruptStackFrame) {
    unsafe {
        pic_eoi(4);
    }
}
