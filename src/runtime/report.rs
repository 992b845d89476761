//! RunReport - what happened to every unit in one run

use std::sync::Arc;
use std::time::Duration;

use crate::status::Status;

/// Final state of a unit after a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Completed,
    Failed(Status),
    /// Not run: this upstream unit failed
    Skipped { blocked_by: Arc<str> },
}

/// Outcome of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub name: Arc<str>,
    pub status: UnitStatus,
    /// Wall time of the activation (zero when skipped)
    pub duration: Duration,
}

impl UnitOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.status, UnitStatus::Completed)
    }

    #[inline]
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, UnitStatus::Skipped { .. })
    }

    pub fn error(&self) -> Option<&Status> {
        match &self.status {
            UnitStatus::Failed(status) => Some(status),
            _ => None,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_index: u64,
    /// First failure by completion time, or ok
    pub status: Status,
    /// One entry per unit, in registration order
    pub outcomes: Vec<UnitOutcome>,
    /// Failed unit names in the order their failures were observed
    pub failure_order: Vec<Arc<str>>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn outcome(&self, name: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.name.as_ref() == name)
    }

    pub fn completed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.error().is_some())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.is_skipped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: UnitStatus) -> UnitOutcome {
        UnitOutcome {
            name: Arc::from(name),
            status,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn partitions_outcomes() {
        let report = RunReport {
            run_index: 0,
            status: Status::error(4, "b broke"),
            outcomes: vec![
                outcome("a", UnitStatus::Completed),
                outcome("b", UnitStatus::Failed(Status::error(4, "b broke"))),
                outcome(
                    "c",
                    UnitStatus::Skipped {
                        blocked_by: Arc::from("b"),
                    },
                ),
            ],
            failure_order: vec![Arc::from("b")],
            duration: Duration::ZERO,
        };

        assert!(!report.is_ok());
        assert_eq!(report.completed().count(), 1);
        assert_eq!(report.failed().next().unwrap().name.as_ref(), "b");
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.outcome("b").unwrap().error().unwrap().code(), 4);
        assert!(report.outcome("zzz").is_none());
    }
}
