//! Common type definitions shared across the crate.
//!
//! - [`UserId`]: user account identifier (UUID)
//! - [`RequestName`]: the canonical (lowercased) primary key of a pick request
//! - [`abbrev_uuid`]: abbreviate UUIDs for logging

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;

/// Canonical pick-request name: lowercased, validated by
/// [`crate::validators::RequestNameValidator`] before it ever reaches the store.
pub type RequestName = String;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&uuid), "550e8400");
    }
}
