//! HTTP request handlers.

pub mod auth;
pub mod health;
pub mod pick_requests;
pub mod products;
pub mod static_assets;
pub mod users;
