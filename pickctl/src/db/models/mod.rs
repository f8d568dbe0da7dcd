//! Database record structures matching table schemas.

pub mod pick_requests;
pub mod users;
