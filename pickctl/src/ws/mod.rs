//! WebSocket transport: real-time scanning sessions.
//!
//! Two session kinds exist, both authenticated with an access token passed
//! as a `token` query parameter:
//!
//! - [`picker`]: bound to one claimed request; turns decoded scans into
//!   ledger updates with a per-session debounce and scan-to-count mode.
//! - [`requester`]: builds a cart of scanned products and submits it as a
//!   new pick request.
//!
//! Sessions hold only per-connection state (the cart, the last-seen scan);
//! everything durable goes through the coordinator inside its own
//! transaction.

pub mod picker;
pub mod requester;

use serde::Deserialize;
use serde_json::json;

use crate::errors::Error;

/// Query parameters accepted by the WebSocket endpoints.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
    /// Pick request a picker session is bound to.
    pub request: Option<String>,
}

/// Render an error as the transport's error frame.
pub(crate) fn error_frame(err: &Error) -> String {
    let mut body = json!({
        "type": "error",
        "code": err.code(),
        "message": err.user_message(),
    });
    if let Some(details) = err.details() {
        body["details"] = details;
    }
    body.to_string()
}
