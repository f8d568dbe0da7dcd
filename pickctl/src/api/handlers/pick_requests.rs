//! HTTP handlers for pick-request CRUD and the picking workflow.
//!
//! Every mutating handler follows the same shape: derive the caller's
//! capability, open one transaction, run the repository operation, commit,
//! and render the fresh view. Errors roll the transaction back by dropping
//! it and surface unchanged.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::pick_requests::{
        ApproveRequest, ItemQuantityUpdate, ItemResponse, ItemShortageUpdate, ListPickRequestsQuery, MessageResponse,
        NameValidationResponse, PickRequestCreate, PickRequestListResponse, PickRequestResponse, ShortageSummary,
        SubmitRequest, SubmitResponse, ValidateNameQuery, WorkflowResponse,
    },
    api::models::users::CurrentUser,
    db::handlers::PickRequests,
    db::models::pick_requests::{
        ItemCreateDBRequest, PickRequestCreateDBRequest, PickRequestFilter, ShortageUpdate,
    },
    errors::Error,
    validators::{NameValidation, validate_request_name},
};

/// Check a proposed request name for syntax and availability.
#[utoipa::path(
    get,
    path = "/pick-requests/validate-name",
    params(ValidateNameQuery),
    tag = "pick-requests",
    responses(
        (status = 200, description = "Validation result", body = NameValidationResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn validate_name(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ValidateNameQuery>,
) -> Result<Json<NameValidationResponse>, Error> {
    match validate_request_name(&query.name) {
        NameValidation::Invalid(reason) => Ok(Json(NameValidationResponse {
            available: false,
            normalized_name: None,
            error: Some(reason.to_string()),
        })),
        NameValidation::Valid(normalized) => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let available = PickRequests::new(&mut conn).name_available(&normalized).await?;
            Ok(Json(NameValidationResponse {
                available,
                normalized_name: Some(normalized),
                error: (!available).then(|| "Request name already exists".to_string()),
            }))
        }
    }
}

/// Create a pick request with its items.
#[utoipa::path(
    post,
    path = "/pick-requests",
    request_body = PickRequestCreate,
    tag = "pick-requests",
    responses(
        (status = 201, description = "Request created", body = PickRequestResponse),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Requester role required"),
        (status = 409, description = "Name already exists"),
        (status = 422, description = "Invalid payload"),
    )
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<PickRequestCreate>,
) -> Result<(StatusCode, Json<PickRequestResponse>), Error> {
    user.require_requester()?;

    let normalized = match validate_request_name(&request.name) {
        NameValidation::Valid(normalized) => normalized,
        NameValidation::Invalid(reason) => {
            return Err(Error::InvalidRequestName {
                reason: reason.to_string(),
            });
        }
    };
    request.validate_payload()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let created = PickRequests::new(&mut tx)
        .create(&PickRequestCreateDBRequest {
            name: normalized,
            priority: request.priority,
            notes: request.notes.clone(),
            created_by: user.id,
            items: request
                .items
                .iter()
                .map(|item| ItemCreateDBRequest {
                    upc: item.upc.trim().to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                })
                .collect(),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(PickRequestResponse::from(&created))))
}

/// List pick requests, urgent first then newest.
#[utoipa::path(
    get,
    path = "/pick-requests",
    params(ListPickRequestsQuery),
    tag = "pick-requests",
    responses(
        (status = 200, description = "Requests", body = PickRequestListResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListPickRequestsQuery>,
) -> Result<Json<PickRequestListResponse>, Error> {
    let filter = PickRequestFilter {
        status: query.status,
        priority: query.priority,
        created_by: query.mine.then_some(user.id),
    };
    let (offset, limit) = query.pagination.clamped();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = PickRequests::new(&mut conn);
    let requests = repo.list(&filter, offset, limit).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PickRequestListResponse {
        requests: requests.iter().map(PickRequestResponse::from).collect(),
        total,
    }))
}

/// Get a pick request by name.
#[utoipa::path(
    get,
    path = "/pick-requests/{name}",
    params(("name" = String, Path, description = "Request name")),
    tag = "pick-requests",
    responses(
        (status = 200, description = "Request", body = PickRequestResponse),
        (status = 404, description = "Request not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<PickRequestResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut conn).get_by_name(&name).await?;
    Ok(Json(PickRequestResponse::from(&request)))
}

/// Delete a pending pick request.
#[utoipa::path(
    delete,
    path = "/pick-requests/{name}",
    params(("name" = String, Path, description = "Request name")),
    tag = "pick-requests",
    responses(
        (status = 200, description = "Request deleted", body = MessageResponse),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not creator or admin"),
        (status = 404, description = "Request not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    PickRequests::new(&mut tx).delete(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Pick request '{name}' deleted"),
    }))
}

/// Start picking: claim the request.
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/start",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Picking started", body = WorkflowResponse),
        (status = 400, description = "Not pending"),
        (status = 423, description = "Claimed by another picker"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, Error> {
    user.require_picker()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut tx).start(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request started".to_string(),
        request: PickRequestResponse::from(&request),
    }))
}

/// Pause picking; the claim is kept.
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/pause",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Picking paused", body = WorkflowResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn pause(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, Error> {
    user.require_picker()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut tx).pause(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request paused".to_string(),
        request: PickRequestResponse::from(&request),
    }))
}

/// Resume a paused or partially completed request.
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/resume",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Picking resumed", body = WorkflowResponse),
        (status = 423, description = "Paused by another picker"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn resume(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, Error> {
    user.require_picker()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut tx).resume(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request resumed".to_string(),
        request: PickRequestResponse::from(&request),
    }))
}

/// Release the claim, returning the request to pending with progress kept.
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/release",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Claim released", body = WorkflowResponse),
        (status = 403, description = "Not claim holder or admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn release(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut tx).release(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request released".to_string(),
        request: PickRequestResponse::from(&request),
    }))
}

/// Cancel the request (creator or admin).
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/cancel",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Request cancelled", body = WorkflowResponse),
        (status = 403, description = "Not creator or admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut tx).cancel(&name, &user).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request cancelled".to_string(),
        request: PickRequestResponse::from(&request),
    }))
}

/// Approve a partially completed request as complete (creator or admin).
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/approve",
    params(("name" = String, Path, description = "Request name")),
    request_body = ApproveRequest,
    tag = "picking",
    responses(
        (status = 200, description = "Request approved", body = WorkflowResponse),
        (status = 400, description = "Not partially completed"),
        (status = 403, description = "Not creator or admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn approve(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<WorkflowResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let approved = PickRequests::new(&mut tx)
        .approve(&name, &user, request.notes.as_deref())
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(WorkflowResponse {
        success: true,
        message: "Pick request approved and completed".to_string(),
        request: PickRequestResponse::from(&approved),
    }))
}

/// Update an item's picked quantity (absolute or increment).
#[utoipa::path(
    patch,
    path = "/pick-requests/{name}/items/{upc}",
    params(
        ("name" = String, Path, description = "Request name"),
        ("upc" = String, Path, description = "Item UPC"),
    ),
    request_body = ItemQuantityUpdate,
    tag = "picking",
    responses(
        (status = 200, description = "Item updated", body = ItemResponse),
        (status = 400, description = "Quantity exceeded"),
        (status = 404, description = "Item not found"),
        (status = 423, description = "Claimed by another picker"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((name, upc)): Path<(String, String)>,
    Json(update): Json<ItemQuantityUpdate>,
) -> Result<Json<ItemResponse>, Error> {
    user.require_picker()?;
    let update = update.into_update()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let item = PickRequests::new(&mut tx)
        .update_item_quantity(&name, &upc, update, &user)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ItemResponse {
        success: true,
        item: (&item).into(),
    }))
}

/// Record a shortage reason for an item.
#[utoipa::path(
    put,
    path = "/pick-requests/{name}/items/{upc}/shortage",
    params(
        ("name" = String, Path, description = "Request name"),
        ("upc" = String, Path, description = "Item UPC"),
    ),
    request_body = ItemShortageUpdate,
    tag = "picking",
    responses(
        (status = 200, description = "Shortage recorded", body = ItemResponse),
        (status = 422, description = "Notes required for reason 'other'"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn set_item_shortage(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((name, upc)): Path<(String, String)>,
    Json(update): Json<ItemShortageUpdate>,
) -> Result<Json<ItemResponse>, Error> {
    user.require_picker()?;
    update.validate_payload()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let item = PickRequests::new(&mut tx)
        .set_item_shortage(
            &name,
            &upc,
            &ShortageUpdate {
                reason: update.shortage_reason,
                notes: update.shortage_notes.clone(),
            },
            &user,
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ItemResponse {
        success: true,
        item: (&item).into(),
    }))
}

/// Shortage roll-up for a request.
#[utoipa::path(
    get,
    path = "/pick-requests/{name}/shortages",
    params(("name" = String, Path, description = "Request name")),
    tag = "picking",
    responses(
        (status = 200, description = "Shortage summary", body = ShortageSummary),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_shortages(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<ShortageSummary>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut conn).get_by_name(&name).await?;
    Ok(Json(ShortageSummary::from_request(&request)))
}

/// Submit the request; the final state is `completed` or
/// `partially_completed` depending on shortages. The completion log is
/// written after the transaction commits; a log failure is reported
/// alongside the successful submit, never rolled back.
#[utoipa::path(
    post,
    path = "/pick-requests/{name}/submit",
    params(("name" = String, Path, description = "Request name")),
    request_body = SubmitRequest,
    tag = "picking",
    responses(
        (status = 200, description = "Request submitted", body = SubmitResponse),
        (status = 422, description = "Shortage reasons missing"),
        (status = 423, description = "Claimed by another picker"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(name): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, Error> {
    user.require_picker()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let submitted = PickRequests::new(&mut tx)
        .submit(&name, &user, request.skip_shortage_validation)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let has_shortages = submitted.has_shortages();
    let (log_file, log_error) = match state.pick_log.write(&submitted) {
        Ok(path) => (Some(path.display().to_string()), None),
        Err(e) => {
            tracing::error!("completion log write failed: {e}");
            (None, Some(e.user_message()))
        }
    };

    let message = if has_shortages {
        "Pick request partially completed"
    } else {
        "Pick request completed"
    };

    Ok(Json(SubmitResponse {
        success: true,
        message: message.to_string(),
        request: PickRequestResponse::from(&submitted),
        log_file,
        log_error,
        has_shortages,
    }))
}
