//! 生物信息学功能模块
//!
//! Sequence handling, FASTA I/O and the HMMER search layer.

pub mod hmmer;
pub mod io;
pub mod seq;
