/*
 * System Call Handlers
 *
 * Each handler validates its userspace pointers, looks up the current
 * process's file descriptor table or heap state via the scheduler, and
 * performs the requested operation. Errors are surfaced as negative
 * `Errno` values per the System V ABI convention `numbers.rs` documents.
 */

use super::numbers::*;
use crate::io::device::Errno;
use crate::memory::brk;
use crate::scheduler;

fn errno_ret(e: Errno) -> isize {
    -(e as i32 as isize)
}

fn validate_user_ptr<T>(ptr: *const T, count: usize) -> Result<(), isize> {
    let addr = ptr as usize;
    if addr == 0 {
        return Err(-EFAULT);
    }
    if addr >= 0x0000_8000_0000_0000 {
        return Err(-EFAULT);
    }
    if addr.checked_add(count * core::mem::size_of::<T>()).is_none() {
        return Err(-EFAULT);
    }
    Ok(())
}

pub fn sys_read(fd: i32, buf: *mut u8, count: usize) -> isize {
    if count == 0 {
        return 0;
    }
    if let Err(e) = validate_user_ptr(buf, count) {
        return e;
    }
    let slice = unsafe { core::slice::from_raw_parts_mut(buf, count) };

    let result = scheduler::with_current_process(|process| {
        let device = process.fd_table.get(fd)?;
        device.read(slice)
    });

    match result {
        Some(Ok(n)) => n as isize,
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_write(fd: i32, buf: *const u8, count: usize) -> isize {
    if count == 0 {
        return 0;
    }
    if let Err(e) = validate_user_ptr(buf, count) {
        return e;
    }
    let slice = unsafe { core::slice::from_raw_parts(buf, count) };

    let result = scheduler::with_current_process(|process| {
        let device = process.fd_table.get(fd)?;
        device.write(slice)
    });

    match result {
        Some(Ok(n)) => n as isize,
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_close(fd: i32) -> isize {
    let result = scheduler::with_current_process_mut(|process| process.fd_table.close(fd));
    match result {
        Some(Ok(())) => 0,
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_fstat(fd: i32, statbuf: *mut u8) -> isize {
    if let Err(e) = validate_user_ptr(statbuf, core::mem::size_of::<crate::io::device::Stat>()) {
        return e;
    }
    let result = scheduler::with_current_process(|process| {
        process.fd_table.get(fd).map(|device| device.stat())
    });
    match result {
        Some(Ok(stat)) => {
            unsafe { (statbuf as *mut crate::io::device::Stat).write(stat) };
            0
        }
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_lseek(fd: i32, offset: i64, whence: i32) -> isize {
    let result = scheduler::with_current_process(|process| {
        let device = process.fd_table.get(fd)?;
        device.seek(offset, whence)
    });
    match result {
        Some(Ok(pos)) => pos as isize,
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_isatty(fd: i32) -> isize {
    let result =
        scheduler::with_current_process(|process| process.fd_table.get(fd).map(|d| d.is_tty()));
    match result {
        Some(Ok(true)) => 1,
        Some(Ok(false)) => 0,
        Some(Err(e)) => errno_ret(e),
        None => errno_ret(Errno::EBADF),
    }
}

pub fn sys_brk(addr: *mut u8) -> isize {
    match brk::brk(addr as u64) {
        Ok(new_brk) => new_brk as isize,
        Err(e) => errno_ret(e),
    }
}

pub fn sys_exit(status: i32) -> ! {
    scheduler::exit_current_thread(status)
}

pub fn sys_yield() -> isize {
    scheduler::switch();
    0
}
