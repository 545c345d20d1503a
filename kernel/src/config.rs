/*
 * Compile-Time Kernel Configuration
 *
 * No runtime config file existed in the teacher kernel either; these are
 * the constants the core scheduler, VM fault path, and tty layer are
 * parameterized on.
 */

/// Size of a page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// Upper bound of user-addressable virtual memory. `brk` may never grow
/// the heap past this address.
pub const USER_MEM_HIGH: u64 = 0x0000_8000_0000_0000;

/// Major device number for tty devices.
pub const TTY_MAJOR: u32 = 4;

/// Per-thread kernel stack size.
pub const THREAD_STACK_SIZE: usize = 64 * 1024;
