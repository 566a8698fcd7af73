#![forbid(unsafe_code)]

pub mod shugart;

pub use shugart::{DiskTimer, ShugartController};
