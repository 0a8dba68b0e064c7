//! Pull-request policy outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregated outcome of a pull request's policy evaluations.
///
/// A pull request typically has several evaluations (build validation,
/// required reviewers, comment resolution). The cached row stores the
/// worst-severity outcome across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Broken,
    Rejected,
    Queued,
    Running,
    Approved,
    NotApplicable,
}

impl PolicyStatus {
    /// Severity rank; lower is worse.
    fn rank(self) -> u8 {
        match self {
            PolicyStatus::Broken => 0,
            PolicyStatus::Rejected => 1,
            PolicyStatus::Queued => 2,
            PolicyStatus::Running => 3,
            PolicyStatus::Approved => 4,
            PolicyStatus::NotApplicable => 5,
        }
    }

    /// Folds two outcomes to the worse of the pair.
    pub fn worst(self, other: PolicyStatus) -> PolicyStatus {
        if other.rank() < self.rank() {
            other
        } else {
            self
        }
    }

    /// Short human-readable reason used when this status wins the fold.
    pub fn reason(self) -> &'static str {
        match self {
            PolicyStatus::Broken => "A policy check is broken",
            PolicyStatus::Rejected => "A policy check was rejected",
            PolicyStatus::Queued => "Policy checks are queued",
            PolicyStatus::Running => "Policy checks are running",
            PolicyStatus::Approved => "All policy checks passed",
            PolicyStatus::NotApplicable => "No policies apply",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyStatus::Broken => "Broken",
            PolicyStatus::Rejected => "Rejected",
            PolicyStatus::Queued => "Queued",
            PolicyStatus::Running => "Running",
            PolicyStatus::Approved => "Approved",
            PolicyStatus::NotApplicable => "NotApplicable",
        }
    }

    pub fn parse(s: &str) -> Option<PolicyStatus> {
        match s {
            "Broken" => Some(PolicyStatus::Broken),
            "Rejected" => Some(PolicyStatus::Rejected),
            "Queued" => Some(PolicyStatus::Queued),
            "Running" => Some(PolicyStatus::Running),
            "Approved" => Some(PolicyStatus::Approved),
            "NotApplicable" => Some(PolicyStatus::NotApplicable),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
