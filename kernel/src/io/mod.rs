/*
 * Input/Output System
 *
 * Device abstraction layer (the `Device` trait and per-process file
 * descriptor table) plus the tty stack built on top of it: the driver
 * contract, line discipline, and the one `Tty` device this kernel ships.
 */

pub mod device;
pub mod driver;
pub mod fd;
pub mod line_discipline;
pub mod tty;

pub use device::{Device, Errno};
pub use driver::{ConsoleDriver, Driver};
pub use fd::FileDescriptorTable;
pub use tty::Tty;
