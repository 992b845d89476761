//! Status - the result value returned across every public boundary
//!
//! `code == 0` means success. Engine failures use the numeric
//! [`ErrorCode`] of the originating [`NodeflowError`] and remember that
//! origin; user code may return any non-zero code of its own, including
//! numbers an [`ErrorCode`] also uses, without being mistaken for one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, NodeflowError};

/// Code used by [`Status::fail`] for failures without a specific code
pub const GENERIC_FAILURE: i32 = -1;

/// Result of an operation: a code plus a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    code: i32,
    message: String,
    /// Set only when the status was built from a `NodeflowError`
    #[serde(skip)]
    origin: Option<ErrorCode>,
}

impl Status {
    /// Successful status
    #[inline]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Failing status with an explicit code.
    ///
    /// A code of `0` would read as success, so it is replaced by
    /// [`GENERIC_FAILURE`].
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: if code == 0 { GENERIC_FAILURE } else { code },
            message: message.into(),
            origin: None,
        }
    }

    /// Failing status with the generic failure code
    pub fn fail(message: impl Into<String>) -> Self {
        Self::error(GENERIC_FAILURE, message)
    }

    /// Collapse a `Result` into a status, keeping engine codes intact
    pub fn from_result<E: Into<Status>>(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => e.into(),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    #[inline]
    pub fn is_err(&self) -> bool {
        self.code != 0
    }

    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Engine error code, if this status came from the engine.
    ///
    /// A unit body returning `Status::error(32, ..)` is not a `Timeout`.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.origin
    }

    /// Check whether the engine raised this status with `code`
    pub fn is(&self, code: ErrorCode) -> bool {
        self.origin == Some(code)
    }

    /// Keep the first failure: returns `self` if it already failed, else `other`
    pub fn or(self, other: Status) -> Status {
        if self.is_err() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "ok")
        } else {
            write!(f, "error {}: {}", self.code, self.message)
        }
    }
}

impl From<NodeflowError> for Status {
    fn from(err: NodeflowError) -> Self {
        Self::from(&err)
    }
}

impl From<&NodeflowError> for Status {
    fn from(err: &NodeflowError) -> Self {
        let code = err.error_code();
        Self {
            code: code.as_i32(),
            message: err.to_string(),
            origin: Some(code),
        }
    }
}

impl<T> From<crate::Result<T>> for Status {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(_) => Status::ok(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_has_zero_code() {
        let status = Status::ok();
        assert!(status.is_ok());
        assert!(!status.is_err());
        assert_eq!(status.code(), 0);
        assert_eq!(status.message(), "");
        assert_eq!(status.to_string(), "ok");
    }

    #[test]
    fn zero_code_error_is_not_success() {
        let status = Status::error(0, "broken");
        assert!(status.is_err());
        assert_eq!(status.code(), GENERIC_FAILURE);
    }

    #[test]
    fn engine_errors_keep_their_code() {
        let status: Status = NodeflowError::UnknownParameter { name: "cfg".into() }.into();
        assert!(status.is(ErrorCode::UnknownParameter));
        assert_eq!(status.error_code(), Some(ErrorCode::UnknownParameter));
        assert!(status.message().contains("cfg"));
    }

    #[test]
    fn user_codes_have_no_engine_mapping() {
        let status = Status::error(4242, "custom");
        assert_eq!(status.error_code(), None);
        assert_eq!(status.to_string(), "error 4242: custom");
    }

    #[test]
    fn user_code_matching_an_engine_number_is_still_user() {
        let status = Status::error(ErrorCode::Timeout.as_i32(), "user failure");
        assert_eq!(status.code(), 32);
        assert_eq!(status.error_code(), None);
        assert!(!status.is(ErrorCode::Timeout));
    }

    #[test]
    fn or_keeps_first_failure() {
        let first = Status::fail("first");
        let second = Status::error(7, "second");
        assert_eq!(first.clone().or(second.clone()), first);
        assert_eq!(Status::ok().or(second.clone()), second);
    }

    #[test]
    fn from_result_maps_both_arms() {
        let ok: Result<(), NodeflowError> = Ok(());
        assert!(Status::from_result(ok).is_ok());

        let err: Result<(), NodeflowError> = Err(NodeflowError::UnknownEvent {
            event: "done".into(),
        });
        assert!(Status::from_result(err).is(ErrorCode::UnknownEvent));
    }
}
