//! The pick-request state machine.
//!
//! Defines the closed set of lifecycle states and the transition table that
//! every mutating operation is checked against before it touches the store.
//! The table is pure data; the request store enforces it inside the same
//! transaction that applies the transition's side effects.
//!
//! ```text
//!                                     ┌─────────────┐
//!                                     │  CANCELLED  │
//!                                     └─────────────┘
//!                                           ▲
//!                                           │ cancel
//!                                           │
//! ┌─────────┐   start    ┌─────────────┐  submit   ┌───────────────────┐
//! │ PENDING │ ─────────▶ │ IN_PROGRESS │ ────────▶ │     COMPLETED     │
//! └─────────┘            └─────────────┘           └───────────────────┘
//!      ▲                    │       ▲                       ▲
//!      │                    │       │                       │
//!      │ release      pause │       │ resume                │ approve
//!      │                    ▼       │                       │
//!      │               ┌─────────┐  │              ┌────────────────────┐
//!      └───────────────│ PAUSED  │──┘              │ PARTIALLY_COMPLETED│
//!                      └─────────┘                 └────────────────────┘
//!                                                          │
//!                                                          │ resume
//!                                                          ▼
//!                                                     IN_PROGRESS
//! ```
//!
//! `completed` and `cancelled` are terminal: no operation ever leaves them.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Lifecycle state of a pick request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Paused,
    PartiallyCompleted,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Paused => "paused",
            RequestStatus::PartiallyCompleted => "partially_completed",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states are never the source of a further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }

    /// A claim must be held exactly in these states.
    pub fn requires_claim(&self) -> bool {
        matches!(
            self,
            RequestStatus::InProgress | RequestStatus::Paused | RequestStatus::PartiallyCompleted
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picking priority; orders request listings (`urgent` first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RequestPriority {
    Urgent,
    Normal,
    Low,
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Urgent => "urgent",
            RequestPriority::Normal => "normal",
            RequestPriority::Low => "low",
        }
    }
}

impl Default for RequestPriority {
    fn default() -> Self {
        RequestPriority::Normal
    }
}

impl fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item came up short of its requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ShortageReason {
    OutOfStock,
    Damaged,
    Expired,
    NotFound,
    Other,
}

impl ShortageReason {
    /// Human-readable form used in completion logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            ShortageReason::OutOfStock => "Out of stock",
            ShortageReason::Damaged => "Damaged",
            ShortageReason::Expired => "Expired",
            ShortageReason::NotFound => "Not found",
            ShortageReason::Other => "Other",
        }
    }
}

/// Operations that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOp {
    Start,
    UpdateItem,
    SetShortage,
    Pause,
    Resume,
    Release,
    Submit,
    Approve,
    Cancel,
    Delete,
}

impl WorkflowOp {
    /// Source states from which this operation is permitted.
    pub fn allowed_sources(&self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            WorkflowOp::Start => &[Pending],
            WorkflowOp::UpdateItem | WorkflowOp::SetShortage | WorkflowOp::Pause | WorkflowOp::Submit => &[InProgress],
            WorkflowOp::Resume => &[Paused, PartiallyCompleted],
            WorkflowOp::Release => &[InProgress, Paused, PartiallyCompleted],
            WorkflowOp::Approve => &[PartiallyCompleted],
            WorkflowOp::Cancel => &[Pending, InProgress, Paused, PartiallyCompleted],
            WorkflowOp::Delete => &[Pending],
        }
    }

    /// Human-readable `expected` phrase for `INVALID_STATUS` errors,
    /// e.g. "in_progress, paused, or partially_completed".
    pub fn expected_phrase(&self) -> String {
        match self.allowed_sources() {
            [only] => only.as_str().to_string(),
            [a, b] => format!("{a} or {b}"),
            [head @ .., last] => {
                let head = head.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
                format!("{head}, or {last}")
            }
            [] => unreachable!("every operation has at least one source state"),
        }
    }
}

/// Check that `op` is permitted from `current`, returning the
/// `INVALID_STATUS` error the transport surfaces otherwise.
pub fn check_transition(current: RequestStatus, op: WorkflowOp) -> Result<(), Error> {
    if op.allowed_sources().contains(&current) {
        Ok(())
    } else {
        Err(Error::InvalidStatus {
            current: current.as_str().to_string(),
            expected: op.expected_phrase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn test_terminal_states_accept_no_operation() {
        let ops = [
            WorkflowOp::Start,
            WorkflowOp::UpdateItem,
            WorkflowOp::SetShortage,
            WorkflowOp::Pause,
            WorkflowOp::Resume,
            WorkflowOp::Release,
            WorkflowOp::Submit,
            WorkflowOp::Approve,
            WorkflowOp::Cancel,
            WorkflowOp::Delete,
        ];
        for terminal in [Completed, Cancelled] {
            for op in ops {
                assert!(
                    check_transition(terminal, op).is_err(),
                    "{op:?} must be rejected from {terminal}"
                );
            }
        }
    }

    #[test]
    fn test_claim_bearing_states() {
        assert!(!Pending.requires_claim());
        assert!(InProgress.requires_claim());
        assert!(Paused.requires_claim());
        assert!(PartiallyCompleted.requires_claim());
        assert!(!Completed.requires_claim());
        assert!(!Cancelled.requires_claim());
    }

    #[test]
    fn test_start_only_from_pending() {
        assert!(check_transition(Pending, WorkflowOp::Start).is_ok());
        for status in [InProgress, Paused, PartiallyCompleted, Completed, Cancelled] {
            assert!(check_transition(status, WorkflowOp::Start).is_err());
        }
    }

    #[test]
    fn test_resume_sources() {
        assert!(check_transition(Paused, WorkflowOp::Resume).is_ok());
        assert!(check_transition(PartiallyCompleted, WorkflowOp::Resume).is_ok());
        assert!(check_transition(InProgress, WorkflowOp::Resume).is_err());
    }

    #[test]
    fn test_approve_only_from_partially_completed() {
        assert!(check_transition(PartiallyCompleted, WorkflowOp::Approve).is_ok());
        // Once released back to pending, approval is no longer possible.
        assert!(check_transition(Pending, WorkflowOp::Approve).is_err());
    }

    #[test]
    fn test_invalid_status_error_shape() {
        let err = check_transition(Completed, WorkflowOp::Release).unwrap_err();
        match err {
            Error::InvalidStatus { current, expected } => {
                assert_eq!(current, "completed");
                assert_eq!(expected, "in_progress, paused, or partially_completed");
            }
            other => panic!("expected InvalidStatus, got {other:?}"),
        }
    }

    #[test]
    fn test_expected_phrase_single_source() {
        assert_eq!(WorkflowOp::Start.expected_phrase(), "pending");
        assert_eq!(WorkflowOp::Resume.expected_phrase(), "paused or partially_completed");
    }
}
