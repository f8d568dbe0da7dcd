//! Repository implementations for database access.

pub mod pick_requests;
pub mod repository;
pub mod users;

pub use pick_requests::PickRequests;
pub use repository::Repository;
pub use users::Users;
