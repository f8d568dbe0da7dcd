//! Picker scanning session.
//!
//! A picker connects with the name of a request they hold (or are about to
//! work) and streams decoded barcodes plus manual updates. The session:
//!
//! - matches each scan against the request's item UPCs (substring rule,
//!   longest stored UPC wins);
//! - drops a repeated scan of the same UPC inside a one-second window - a
//!   usability contract only, the ledger stays correct without it;
//! - auto-increments items whose `requested_qty` is at most the configured
//!   threshold (scan-to-count), silently no-opping once fully picked;
//! - reports bulk items (above the threshold) as detections for the
//!   operator to enter an absolute count.

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::{
    AppState,
    api::models::pick_requests::{PickRequestItemResponse, PickRequestResponse},
    api::models::users::CurrentUser,
    auth::middleware::authenticate_token,
    catalog::Catalog,
    db::handlers::PickRequests,
    db::models::pick_requests::{QuantityUpdate, ShortageUpdate},
    errors::Error,
    workflow::ShortageReason,
    ws::{WsAuthQuery, error_frame},
};

/// Messages accepted from the picker client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PickerClientMessage {
    /// A decoded barcode from the scanner adapter
    Scan { code: String },
    /// Manual quantity entry
    Update {
        upc: String,
        picked_qty: Option<i64>,
        increment: Option<i64>,
    },
    /// Record a shortage reason
    Shortage {
        upc: String,
        reason: ShortageReason,
        notes: Option<String>,
    },
    /// Submit the request
    Submit {
        #[serde(default)]
        skip_shortage_validation: bool,
    },
    /// Re-send the current request snapshot
    GetRequest,
    Stop,
}

/// Per-session scan debounce: a second observation of the same UPC within
/// the window is dropped. State never leaves the connection.
#[derive(Debug)]
pub struct ScanDebounce {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl ScanDebounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether a scan of `upc` observed at `now` should be processed.
    pub fn should_process(&mut self, upc: &str, now: Instant) -> bool {
        let duplicate = self
            .last
            .as_ref()
            .is_some_and(|(last_upc, at)| last_upc == upc && now.duration_since(*at) < self.window);

        if !duplicate {
            self.last = Some((upc.to_string(), now));
        }
        !duplicate
    }
}

/// WebSocket endpoint: `GET /ws/picker?token=..&request=..`.
pub async fn picker_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, Error> {
    let user = authenticate_token(&state.db, &state.config, &query.token).await?;
    user.require_picker()?;

    let request_name = query.request.clone().ok_or_else(|| Error::Validation {
        message: "Missing 'request' query parameter".to_string(),
    })?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, state, user, request_name)))
}

async fn run_session(mut socket: WebSocket, state: AppState, user: CurrentUser, request_name: String) {
    tracing::info!(user = %user.username, request = %request_name, "picker session connected");

    // Initial snapshot; a missing request ends the session immediately.
    match load_request(&state, &request_name).await {
        Ok(request) => {
            let init = json!({
                "type": "init",
                "user": user.username,
                "request": request,
                "auto_mode_threshold": state.config.auto_mode_threshold,
            });
            if socket.send(Message::Text(init.to_string().into())).await.is_err() {
                return;
            }
        }
        Err(err) => {
            let _ = socket.send(Message::Text(error_frame(&err).into())).await;
            return;
        }
    }

    let mut debounce = ScanDebounce::new(Duration::from_secs(1));

    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let parsed: PickerClientMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                let err = Error::Validation {
                    message: format!("Malformed message: {e}"),
                };
                if socket.send(Message::Text(error_frame(&err).into())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if matches!(parsed, PickerClientMessage::Stop) {
            tracing::info!(user = %user.username, "picker session stopped by client");
            break;
        }

        let reply = handle_message(&state, &user, &request_name, parsed, &mut debounce).await;
        match reply {
            Ok(Some(frame)) => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            Ok(None) => {} // debounced or silent no-op
            Err(err) => {
                if socket.send(Message::Text(error_frame(&err).into())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(user = %user.username, request = %request_name, "picker session closed");
}

async fn handle_message(
    state: &AppState,
    user: &CurrentUser,
    request_name: &str,
    message: PickerClientMessage,
    debounce: &mut ScanDebounce,
) -> Result<Option<String>, Error> {
    match message {
        PickerClientMessage::Scan { code } => handle_scan(state, user, request_name, &code, debounce).await,
        PickerClientMessage::Update {
            upc,
            picked_qty,
            increment,
        } => {
            let update = match (picked_qty, increment) {
                (Some(qty), None) => QuantityUpdate::Absolute(qty),
                (None, Some(step)) => QuantityUpdate::Increment(step),
                _ => {
                    return Err(Error::Validation {
                        message: "Provide exactly one of 'picked_qty' or 'increment'".to_string(),
                    });
                }
            };

            let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
            let item = PickRequests::new(&mut tx)
                .update_item_quantity(request_name, &upc, update, user)
                .await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;

            Ok(Some(
                json!({
                    "type": "item_updated",
                    "auto": false,
                    "item": PickRequestItemResponse::from(&item),
                })
                .to_string(),
            ))
        }
        PickerClientMessage::Shortage { upc, reason, notes } => {
            let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
            let item = PickRequests::new(&mut tx)
                .set_item_shortage(request_name, &upc, &ShortageUpdate { reason, notes }, user)
                .await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;

            Ok(Some(
                json!({
                    "type": "shortage_recorded",
                    "item": PickRequestItemResponse::from(&item),
                })
                .to_string(),
            ))
        }
        PickerClientMessage::Submit {
            skip_shortage_validation,
        } => {
            let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
            let submitted = PickRequests::new(&mut tx)
                .submit(request_name, user, skip_shortage_validation)
                .await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;

            let (log_file, log_error) = match state.pick_log.write(&submitted) {
                Ok(path) => (Some(path.display().to_string()), None),
                Err(e) => {
                    tracing::error!("completion log write failed: {e}");
                    (None, Some(e.user_message()))
                }
            };

            Ok(Some(
                json!({
                    "type": "submitted",
                    "request": PickRequestResponse::from(&submitted),
                    "log_file": log_file,
                    "log_error": log_error,
                })
                .to_string(),
            ))
        }
        PickerClientMessage::GetRequest => {
            let request = load_request(state, request_name).await?;
            Ok(Some(json!({ "type": "request", "request": request }).to_string()))
        }
        PickerClientMessage::Stop => Ok(None),
    }
}

/// Match a scan against the request's items and apply scan-to-count.
async fn handle_scan(
    state: &AppState,
    user: &CurrentUser,
    request_name: &str,
    code: &str,
    debounce: &mut ScanDebounce,
) -> Result<Option<String>, Error> {
    let request = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        PickRequests::new(&mut conn).get_by_name(request_name).await?
    };

    let Some(matched_upc) = Catalog::match_in(code, request.items.iter().map(|i| i.upc.as_str())) else {
        return Ok(Some(json!({ "type": "no_match", "code": code }).to_string()));
    };
    let matched_upc = matched_upc.to_string();

    if !debounce.should_process(&matched_upc, Instant::now()) {
        return Ok(None);
    }

    let item = request.item(&matched_upc).ok_or_else(|| Error::ItemNotFound {
        upc: matched_upc.clone(),
    })?;

    if item.requested_qty > state.config.auto_mode_threshold {
        // Bulk mode: surface the detection, the operator enters the count.
        return Ok(Some(
            json!({
                "type": "detection",
                "upc": matched_upc,
                "product_name": item.product_name,
                "requested_qty": item.requested_qty,
                "picked_qty": item.picked_qty,
                "requires_manual_entry": true,
            })
            .to_string(),
        ));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (item, changed) = PickRequests::new(&mut tx)
        .scan_increment(request_name, &matched_upc, user)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if !changed {
        // Already fully picked: the scan is a silent no-op.
        return Ok(None);
    }

    Ok(Some(
        json!({
            "type": "item_updated",
            "auto": true,
            "item": PickRequestItemResponse::from(&item),
        })
        .to_string(),
    ))
}

async fn load_request(state: &AppState, name: &str) -> Result<PickRequestResponse, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = PickRequests::new(&mut conn).get_by_name(name).await?;
    Ok(PickRequestResponse::from(&request))
}
