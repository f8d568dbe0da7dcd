//! Requester cart session: build a pick request by scanning.
//!
//! The requester scans product barcodes (resolved against the catalog),
//! collects items with quantities in an in-memory cart, and finally submits
//! the cart under a request name. The cart lives only in the connection;
//! nothing touches the store until submit.

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::{
    AppState,
    api::models::pick_requests::PickRequestResponse,
    api::models::users::CurrentUser,
    auth::middleware::authenticate_token,
    db::handlers::PickRequests,
    db::models::pick_requests::{ItemCreateDBRequest, PickRequestCreateDBRequest},
    errors::Error,
    validators::{MAX_REQUESTED_QTY, NameValidation, validate_request_name},
    workflow::RequestPriority,
    ws::{WsAuthQuery, error_frame},
};

/// Messages accepted from the requester client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequesterClientMessage {
    /// A decoded barcode; resolved against the catalog
    Scan { code: String },
    AddItem { upc: String, quantity: i64 },
    RemoveItem { upc: String },
    UpdateQuantity { upc: String, quantity: i64 },
    GetCart,
    ClearCart,
    Submit {
        name: String,
        #[serde(default)]
        priority: RequestPriority,
        notes: Option<String>,
    },
    Stop,
}

/// One line of the in-memory cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub upc: String,
    pub product_name: String,
    pub quantity: i64,
    pub main_category: Option<String>,
    pub subcategory: Option<String>,
}

/// Shopping cart for building a pick request. Insertion order is kept so the
/// submitted request lists items in scan order.
#[derive(Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Add an item, merging quantities when the UPC is already present.
    pub fn add(&mut self, item: CartItem) {
        match self.items.iter_mut().find(|existing| existing.upc == item.upc) {
            Some(existing) => existing.quantity += item.quantity,
            None => self.items.push(item),
        }
    }

    pub fn remove(&mut self, upc: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.upc != upc);
        self.items.len() != before
    }

    /// Set an item's quantity; zero or less removes it.
    pub fn update_quantity(&mut self, upc: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(upc);
        }
        match self.items.iter_mut().find(|item| item.upc == upc) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// WebSocket endpoint: `GET /ws/requester?token=..`.
pub async fn requester_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, Error> {
    let user = authenticate_token(&state.db, &state.config, &query.token).await?;
    user.require_requester()?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, state, user)))
}

async fn run_session(mut socket: WebSocket, state: AppState, user: CurrentUser) {
    tracing::info!(user = %user.username, "requester session connected");

    let categories: HashMap<String, HashMap<String, usize>> = state
        .catalog
        .load_full()
        .map(|catalog| catalog.categories())
        .unwrap_or_default();

    let init = json!({
        "type": "init",
        "user": user.username,
        "categories": categories,
        "cart": [],
        "total_items": 0,
    });
    if socket.send(Message::Text(init.to_string().into())).await.is_err() {
        return;
    }

    let mut cart = Cart::default();

    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let parsed: RequesterClientMessage = match serde_json::from_str(&text) {
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

        if matches!(parsed, RequesterClientMessage::Stop) {
            break;
        }

        let reply = handle_message(&state, &user, &mut cart, parsed).await;
        let frame = match reply {
            Ok(frame) => frame,
            Err(err) => error_frame(&err),
        };
        if socket.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }

    tracing::info!(user = %user.username, "requester session closed");
}

fn cart_updated(cart: &Cart) -> String {
    json!({
        "type": "cart_updated",
        "items": cart.items(),
        "total_items": cart.total_items(),
        "total_quantity": cart.total_quantity(),
    })
    .to_string()
}

async fn handle_message(
    state: &AppState,
    user: &CurrentUser,
    cart: &mut Cart,
    message: RequesterClientMessage,
) -> Result<String, Error> {
    match message {
        RequesterClientMessage::Scan { code } => {
            let catalog = state.catalog()?;
            match catalog.match_scanned_code(&code) {
                Some(product) => Ok(json!({
                    "type": "detection",
                    "upc": product.upc,
                    "product": product,
                })
                .to_string()),
                None => Ok(json!({ "type": "no_match", "code": code }).to_string()),
            }
        }
        RequesterClientMessage::AddItem { upc, quantity } => {
            if quantity < 1 || quantity > MAX_REQUESTED_QTY {
                return Err(Error::Validation {
                    message: format!("Quantity must be between 1 and {MAX_REQUESTED_QTY}"),
                });
            }

            let catalog = state.catalog()?;
            let product = catalog
                .get(&upc)
                .ok_or_else(|| Error::ProductNotFound { code: upc.clone() })?;

            cart.add(CartItem {
                upc: product.upc.clone(),
                product_name: product.name.clone(),
                quantity,
                main_category: product.main_category.clone(),
                subcategory: product.subcategory.clone(),
            });
            Ok(cart_updated(cart))
        }
        RequesterClientMessage::RemoveItem { upc } => {
            cart.remove(&upc);
            Ok(cart_updated(cart))
        }
        RequesterClientMessage::UpdateQuantity { upc, quantity } => {
            if !cart.update_quantity(&upc, quantity) {
                return Err(Error::ItemNotFound { upc });
            }
            Ok(cart_updated(cart))
        }
        RequesterClientMessage::GetCart => Ok(cart_updated(cart)),
        RequesterClientMessage::ClearCart => {
            cart.clear();
            Ok(cart_updated(cart))
        }
        RequesterClientMessage::Submit { name, priority, notes } => {
            if cart.is_empty() {
                return Err(Error::Validation {
                    message: "Cart is empty".to_string(),
                });
            }

            let normalized = match validate_request_name(&name) {
                NameValidation::Valid(normalized) => normalized,
                NameValidation::Invalid(reason) => {
                    return Err(Error::InvalidRequestName {
                        reason: reason.to_string(),
                    });
                }
            };

            let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
            let created = PickRequests::new(&mut tx)
                .create(&PickRequestCreateDBRequest {
                    name: normalized,
                    priority,
                    notes,
                    created_by: user.id,
                    items: cart
                        .items()
                        .iter()
                        .map(|item| ItemCreateDBRequest {
                            upc: item.upc.clone(),
                            product_name: item.product_name.clone(),
                            quantity: item.quantity,
                        })
                        .collect(),
                })
                .await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;

            cart.clear();
            let response = PickRequestResponse::from(&created);
            Ok(json!({
                "type": "submitted",
                "request_name": response.name.clone(),
                "items_count": response.items.len(),
                "request": response,
            })
            .to_string())
        }
        RequesterClientMessage::Stop => unreachable!("handled by the session loop"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(upc: &str, quantity: i64) -> CartItem {
        CartItem {
            upc: upc.to_string(),
            product_name: format!("product-{upc}"),
            quantity,
            main_category: None,
            subcategory: None,
        }
    }

    #[test]
    fn test_add_merges_quantities() {
        let mut cart = Cart::default();
        cart.add(item("100", 2));
        cart.add(item("100", 3));

        assert_eq!(cart.total_items(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let mut cart = Cart::default();
        cart.add(item("100", 2));
        cart.add(item("200", 1));

        assert!(cart.update_quantity("100", 7));
        assert_eq!(cart.items()[0].quantity, 7);

        // Zero quantity removes the line.
        assert!(cart.update_quantity("200", 0));
        assert_eq!(cart.total_items(), 1);

        assert!(!cart.update_quantity("missing", 3));
        assert!(!cart.remove("missing"));
        assert!(cart.remove("100"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut cart = Cart::default();
        cart.add(item("300", 1));
        cart.add(item("100", 1));
        cart.add(item("200", 1));

        let upcs: Vec<&str> = cart.items().iter().map(|i| i.upc.as_str()).collect();
        assert_eq!(upcs, vec!["300", "100", "200"]);
    }
}
