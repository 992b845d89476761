//! Param Module - shared parameters for cross-unit communication
//!
//! - `registry`: ParamRegistry, one per pipeline
//! - `shared`: Param trait and the typed SharedParam handle

mod registry;
mod shared;

pub use registry::ParamRegistry;
pub use shared::{Param, SharedParam};
