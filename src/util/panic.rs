use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::NodeflowError;
use crate::status::Status;

/// Run a user callback, turning a panic into a `Panicked` status
pub(crate) fn catch_status(name: &str, f: impl FnOnce() -> Status) -> Status {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        NodeflowError::Panicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        }
        .into()
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
