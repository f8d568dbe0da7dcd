//! Database models for pick requests and their items.

use crate::types::UserId;
use crate::workflow::{RequestPriority, RequestStatus, ShortageReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pick-request row as stored, without its items.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PickRequestRow {
    pub name: String,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub claimed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// One line of a request: a product, a requested quantity, and the running
/// picked quantity with optional shortage annotation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PickItemRow {
    pub id: i64,
    pub request_name: String,
    pub upc: String,
    pub product_name: String,
    pub requested_qty: i64,
    pub picked_qty: i64,
    pub shortage_reason: Option<ShortageReason>,
    pub shortage_notes: Option<String>,
}

impl PickItemRow {
    /// An item has a shortage iff it was picked short of the request.
    pub fn has_shortage(&self) -> bool {
        self.picked_qty < self.requested_qty
    }

    pub fn is_complete(&self) -> bool {
        !self.has_shortage()
    }

    pub fn remaining(&self) -> i64 {
        self.requested_qty - self.picked_qty
    }
}

/// A request with its items and resolved principal usernames, loaded eagerly
/// inside one transaction. This is the only view the coordinator hands out;
/// nothing lazily walks relations after the transaction closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRequestDBResponse {
    pub name: String,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub creator_username: Option<String>,
    pub claimed_by: Option<UserId>,
    pub claimant_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub items: Vec<PickItemRow>,
}

impl PickRequestDBResponse {
    pub fn has_shortages(&self) -> bool {
        self.items.iter().any(PickItemRow::has_shortage)
    }

    pub fn total_requested(&self) -> i64 {
        self.items.iter().map(|i| i.requested_qty).sum()
    }

    pub fn total_picked(&self) -> i64 {
        self.items.iter().map(|i| i.picked_qty).sum()
    }

    /// Picked-over-requested percentage, 100.0 for an empty request.
    pub fn completion_rate(&self) -> f64 {
        let requested = self.total_requested();
        if requested == 0 {
            100.0
        } else {
            self.total_picked() as f64 * 100.0 / requested as f64
        }
    }

    pub fn item(&self, upc: &str) -> Option<&PickItemRow> {
        self.items.iter().find(|i| i.upc == upc)
    }
}

/// One item of a create payload, already validated by the API layer.
#[derive(Debug, Clone)]
pub struct ItemCreateDBRequest {
    pub upc: String,
    pub product_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct PickRequestCreateDBRequest {
    /// Canonical (validated, lowercased) name.
    pub name: String,
    pub priority: RequestPriority,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub items: Vec<ItemCreateDBRequest>,
}

/// Quantity update for a single item: exactly one of the two modes.
#[derive(Debug, Clone, Copy)]
pub enum QuantityUpdate {
    /// Set `picked_qty` to an absolute value (>= 0). Never clamped.
    Absolute(i64),
    /// Add to `picked_qty` (>= 1).
    Increment(i64),
}

/// Shortage annotation for a single item.
#[derive(Debug, Clone)]
pub struct ShortageUpdate {
    pub reason: ShortageReason,
    pub notes: Option<String>,
}

/// Filter for listing/counting pick requests.
#[derive(Debug, Clone, Default)]
pub struct PickRequestFilter {
    pub status: Option<RequestStatus>,
    pub priority: Option<RequestPriority>,
    pub created_by: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(requested: i64, picked: i64) -> PickItemRow {
        PickItemRow {
            id: 0,
            request_name: "r".to_string(),
            upc: "0000".to_string(),
            product_name: "p".to_string(),
            requested_qty: requested,
            picked_qty: picked,
            shortage_reason: None,
            shortage_notes: None,
        }
    }

    #[test]
    fn test_shortage_classification() {
        assert!(item(3, 2).has_shortage());
        assert!(item(3, 3).is_complete());
        assert_eq!(item(5, 2).remaining(), 3);
    }

    #[test]
    fn test_completion_rate() {
        let req = PickRequestDBResponse {
            name: "r".to_string(),
            status: crate::workflow::RequestStatus::InProgress,
            priority: crate::workflow::RequestPriority::Normal,
            notes: None,
            created_by: None,
            creator_username: None,
            claimed_by: None,
            claimant_username: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_activity_at: None,
            items: vec![item(3, 3), item(2, 1)],
        };
        assert_eq!(req.total_requested(), 5);
        assert_eq!(req.total_picked(), 4);
        assert!((req.completion_rate() - 80.0).abs() < f64::EPSILON);
        assert!(req.has_shortages());
    }
}
