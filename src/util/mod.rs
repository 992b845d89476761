//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized defaults for pipeline configuration
//! - `panic`: Converting panics in user callbacks into failing statuses

pub mod constants;
mod panic;

pub(crate) use panic::{catch_status, panic_message};
