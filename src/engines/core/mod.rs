//! Core execution engines

pub mod io;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod process;
pub mod timing;
