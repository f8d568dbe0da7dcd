//! API request/response models for pick requests.

use crate::db::models::pick_requests::{PickItemRow, PickRequestDBResponse, QuantityUpdate};
use crate::errors::Error;
use crate::validators::{self, MAX_NOTES_LENGTH, MAX_REQUESTED_QTY, MAX_SHORTAGE_NOTES_LENGTH};
use crate::workflow::{RequestPriority, RequestStatus, ShortageReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemCreate {
    pub upc: String,
    pub product_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PickRequestCreate {
    pub name: String,
    #[serde(default)]
    pub priority: RequestPriority,
    pub notes: Option<String>,
    pub items: Vec<ItemCreate>,
}

impl PickRequestCreate {
    /// Validate everything except the name (which has its own path) before
    /// any row is touched: at least one item, quantity bounds, notes length,
    /// UPC syntax, and no duplicate UPCs within the payload.
    pub fn validate_payload(&self) -> Result<(), Error> {
        if self.items.is_empty() {
            return Err(Error::Validation {
                message: "Request must contain at least one item".to_string(),
            });
        }

        if let Some(notes) = &self.notes
            && notes.len() > MAX_NOTES_LENGTH
        {
            return Err(Error::Validation {
                message: format!("Notes must be at most {MAX_NOTES_LENGTH} characters"),
            });
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            let upc = validators::validate_upc(&item.upc).map_err(|reason| Error::Validation {
                message: format!("Item '{}': {reason}", item.upc),
            })?;

            if !seen.insert(upc.to_string()) {
                return Err(Error::Validation {
                    message: format!("Duplicate UPC '{upc}' in request"),
                });
            }

            if item.product_name.trim().is_empty() {
                return Err(Error::Validation {
                    message: format!("Item '{upc}': product name is required"),
                });
            }

            if item.quantity < 1 || item.quantity > MAX_REQUESTED_QTY {
                return Err(Error::Validation {
                    message: format!("Item '{upc}': quantity must be between 1 and {MAX_REQUESTED_QTY}"),
                });
            }
        }

        Ok(())
    }
}

/// Quantity update: exactly one of the two modes per call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemQuantityUpdate {
    /// Set the picked quantity to an absolute value
    pub picked_qty: Option<i64>,
    /// Add to the picked quantity
    pub increment: Option<i64>,
}

impl ItemQuantityUpdate {
    pub fn into_update(self) -> Result<QuantityUpdate, Error> {
        match (self.picked_qty, self.increment) {
            (Some(qty), None) => Ok(QuantityUpdate::Absolute(qty)),
            (None, Some(step)) => Ok(QuantityUpdate::Increment(step)),
            _ => Err(Error::Validation {
                message: "Provide exactly one of 'picked_qty' or 'increment'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemShortageUpdate {
    pub shortage_reason: ShortageReason,
    pub shortage_notes: Option<String>,
}

impl ItemShortageUpdate {
    pub fn validate_payload(&self) -> Result<(), Error> {
        if let Some(notes) = &self.shortage_notes
            && notes.len() > MAX_SHORTAGE_NOTES_LENGTH
        {
            return Err(Error::Validation {
                message: format!("Shortage notes must be at most {MAX_SHORTAGE_NOTES_LENGTH} characters"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequest {
    #[serde(default)]
    pub skip_shortage_validation: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

/// Query parameters for listing pick requests
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListPickRequestsQuery {
    /// Filter by status
    pub status: Option<RequestStatus>,
    /// Filter by priority
    pub priority: Option<RequestPriority>,
    /// Only requests created by the caller
    #[serde(default)]
    pub mine: bool,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: super::pagination::Pagination,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ValidateNameQuery {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PickRequestItemResponse {
    pub upc: String,
    pub product_name: String,
    pub requested_qty: i64,
    pub picked_qty: i64,
    pub remaining: i64,
    pub is_complete: bool,
    pub shortage_reason: Option<ShortageReason>,
    pub shortage_notes: Option<String>,
}

impl From<&PickItemRow> for PickRequestItemResponse {
    fn from(item: &PickItemRow) -> Self {
        Self {
            upc: item.upc.clone(),
            product_name: item.product_name.clone(),
            requested_qty: item.requested_qty,
            picked_qty: item.picked_qty,
            remaining: item.remaining(),
            is_complete: item.is_complete(),
            shortage_reason: item.shortage_reason,
            shortage_notes: item.shortage_notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PickRequestResponse {
    pub name: String,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub items: Vec<PickRequestItemResponse>,
    pub total_requested: i64,
    pub total_picked: i64,
    pub completion_rate: f64,
    pub has_shortages: bool,
}

impl From<&PickRequestDBResponse> for PickRequestResponse {
    fn from(request: &PickRequestDBResponse) -> Self {
        Self {
            name: request.name.clone(),
            status: request.status,
            priority: request.priority,
            notes: request.notes.clone(),
            created_by: request.creator_username.clone(),
            claimed_by: request.claimant_username.clone(),
            created_at: request.created_at,
            started_at: request.started_at,
            completed_at: request.completed_at,
            last_activity_at: request.last_activity_at,
            items: request.items.iter().map(PickRequestItemResponse::from).collect(),
            total_requested: request.total_requested(),
            total_picked: request.total_picked(),
            completion_rate: request.completion_rate(),
            has_shortages: request.has_shortages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PickRequestListResponse {
    pub requests: Vec<PickRequestResponse>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NameValidationResponse {
    pub available: bool,
    pub normalized_name: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowResponse {
    pub success: bool,
    pub message: String,
    pub request: PickRequestResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub success: bool,
    pub item: PickRequestItemResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub request: PickRequestResponse,
    /// Path of the completion log, when writing it succeeded
    pub log_file: Option<String>,
    /// Present when the transition committed but the log write failed
    pub log_error: Option<String>,
    pub has_shortages: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortageSummaryItem {
    pub upc: String,
    pub product_name: String,
    pub requested_qty: i64,
    pub picked_qty: i64,
    pub missing: i64,
    pub shortage_reason: Option<ShortageReason>,
    pub shortage_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortageSummary {
    pub request_name: String,
    pub total_items: usize,
    pub short_count: usize,
    pub items: Vec<ShortageSummaryItem>,
}

impl ShortageSummary {
    pub fn from_request(request: &PickRequestDBResponse) -> Self {
        let items: Vec<ShortageSummaryItem> = request
            .items
            .iter()
            .filter(|i| i.has_shortage())
            .map(|i| ShortageSummaryItem {
                upc: i.upc.clone(),
                product_name: i.product_name.clone(),
                requested_qty: i.requested_qty,
                picked_qty: i.picked_qty,
                missing: i.remaining(),
                shortage_reason: i.shortage_reason,
                shortage_notes: i.shortage_notes.clone(),
            })
            .collect();

        Self {
            request_name: request.name.clone(),
            total_items: request.items.len(),
            short_count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_create() -> PickRequestCreate {
        PickRequestCreate {
            name: "weekly-restock".to_string(),
            priority: RequestPriority::Normal,
            notes: None,
            items: vec![ItemCreate {
                upc: "29456086".to_string(),
                product_name: "Big Mix".to_string(),
                quantity: 3,
            }],
        }
    }

    #[test]
    fn test_create_payload_validation() {
        assert!(base_create().validate_payload().is_ok());

        let empty = PickRequestCreate {
            items: vec![],
            ..base_create()
        };
        assert!(empty.validate_payload().is_err());

        let mut duplicated = base_create();
        duplicated.items.push(duplicated.items[0].clone());
        let err = duplicated.validate_payload().unwrap_err();
        assert!(err.to_string().contains("Duplicate UPC"));

        let mut excessive = base_create();
        excessive.items[0].quantity = 10_000;
        assert!(excessive.validate_payload().is_err());

        let mut zero = base_create();
        zero.items[0].quantity = 0;
        assert!(zero.validate_payload().is_err());
    }

    #[test]
    fn test_quantity_update_modes_are_exclusive() {
        let both = ItemQuantityUpdate {
            picked_qty: Some(1),
            increment: Some(1),
        };
        assert!(both.into_update().is_err());

        let neither = ItemQuantityUpdate {
            picked_qty: None,
            increment: None,
        };
        assert!(neither.into_update().is_err());

        let absolute = ItemQuantityUpdate {
            picked_qty: Some(4),
            increment: None,
        };
        assert!(matches!(absolute.into_update().unwrap(), QuantityUpdate::Absolute(4)));

        let increment = ItemQuantityUpdate {
            picked_qty: None,
            increment: Some(2),
        };
        assert!(matches!(increment.into_update().unwrap(), QuantityUpdate::Increment(2)));
    }
}
