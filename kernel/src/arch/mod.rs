#[cfg(target_arch = "x86_64")]
#[macro_use]
pub mod x86_64;
