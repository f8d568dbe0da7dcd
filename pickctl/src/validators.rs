//! Input validation for request names, UPC codes, and quantities.
//!
//! Request name rules: 3-50 characters, first character a letter, the rest
//! letters, digits, underscores, or hyphens. Names are trimmed, rejected on
//! any internal whitespace, and canonicalized to lowercase. Canonicalization
//! is idempotent: validating an already-normalized name yields it unchanged.

/// Outcome of validating a raw request name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidation {
    /// Syntactically valid; carries the lowercased canonical form.
    Valid(String),
    /// Rejected; carries a single human-readable phrase.
    Invalid(&'static str),
}

impl NameValidation {
    pub fn normalized(&self) -> Option<&str> {
        match self {
            NameValidation::Valid(name) => Some(name),
            NameValidation::Invalid(_) => None,
        }
    }

    pub fn error(&self) -> Option<&'static str> {
        match self {
            NameValidation::Valid(_) => None,
            NameValidation::Invalid(reason) => Some(reason),
        }
    }
}

pub const NAME_MIN_LENGTH: usize = 3;
pub const NAME_MAX_LENGTH: usize = 50;

/// Validate and normalize a pick-request name.
pub fn validate_request_name(raw: &str) -> NameValidation {
    let name = raw.trim();

    if name.is_empty() {
        return NameValidation::Invalid("Name is required");
    }

    if name.chars().any(char::is_whitespace) {
        return NameValidation::Invalid("Name cannot contain spaces");
    }

    if name.len() < NAME_MIN_LENGTH {
        return NameValidation::Invalid("Name must be at least 3 characters");
    }

    if name.len() > NAME_MAX_LENGTH {
        return NameValidation::Invalid("Name must be at most 50 characters");
    }

    // First character must be a letter; chars() is non-empty here.
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return NameValidation::Invalid("Name must start with a letter");
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return NameValidation::Invalid("Name can only contain letters, numbers, underscores, and hyphens");
    }

    NameValidation::Valid(name.to_ascii_lowercase())
}

pub const UPC_MAX_LENGTH: usize = 20;

/// Validate a UPC/barcode string. Returns the trimmed code or an error phrase.
pub fn validate_upc(raw: &str) -> Result<&str, &'static str> {
    let upc = raw.trim();

    if upc.is_empty() {
        return Err("UPC is required");
    }

    if !upc.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err("UPC must be alphanumeric");
    }

    if upc.len() > UPC_MAX_LENGTH {
        return Err("UPC must be at most 20 characters");
    }

    Ok(upc)
}

/// Upper bound on a single item's requested quantity.
pub const MAX_REQUESTED_QTY: i64 = 9999;

/// Upper bound on request notes length.
pub const MAX_NOTES_LENGTH: usize = 500;

/// Upper bound on per-item shortage notes length.
pub const MAX_SHORTAGE_NOTES_LENGTH: usize = 255;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names_are_lowercased() {
        assert_eq!(
            validate_request_name("Monday-Restock"),
            NameValidation::Valid("monday-restock".to_string())
        );
        assert_eq!(
            validate_request_name("  Monday-Restock  "),
            NameValidation::Valid("monday-restock".to_string())
        );
        assert_eq!(
            validate_request_name("a_b-c123"),
            NameValidation::Valid("a_b-c123".to_string())
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = validate_request_name("Weekly-ORDER_7");
        let normalized = first.normalized().unwrap().to_string();
        let second = validate_request_name(&normalized);
        assert_eq!(second.normalized(), Some(normalized.as_str()));
    }

    #[test]
    fn test_length_boundaries() {
        assert!(matches!(validate_request_name("ab"), NameValidation::Invalid(_)));
        assert!(matches!(validate_request_name("abc"), NameValidation::Valid(_)));
        let fifty = format!("a{}", "b".repeat(49));
        assert!(matches!(validate_request_name(&fifty), NameValidation::Valid(_)));
        let fifty_one = format!("a{}", "b".repeat(50));
        assert_eq!(
            validate_request_name(&fifty_one),
            NameValidation::Invalid("Name must be at most 50 characters")
        );
    }

    #[test]
    fn test_leading_digit_rejected() {
        assert_eq!(
            validate_request_name("1abc"),
            NameValidation::Invalid("Name must start with a letter")
        );
    }

    #[test]
    fn test_internal_whitespace_rejected() {
        assert_eq!(
            validate_request_name("a b"),
            NameValidation::Invalid("Name cannot contain spaces")
        );
        assert_eq!(
            validate_request_name("abc\tdef"),
            NameValidation::Invalid("Name cannot contain spaces")
        );
    }

    #[test]
    fn test_empty_and_bad_characters() {
        assert_eq!(validate_request_name("   "), NameValidation::Invalid("Name is required"));
        assert_eq!(
            validate_request_name("abc!def"),
            NameValidation::Invalid("Name can only contain letters, numbers, underscores, and hyphens")
        );
    }

    #[test]
    fn test_upc_validation() {
        assert_eq!(validate_upc("29456086"), Ok("29456086"));
        assert_eq!(validate_upc(" 29456086 "), Ok("29456086"));
        // Short codes are fine; only empty, malformed, or oversized ones fail.
        assert_eq!(validate_upc("100"), Ok("100"));
        assert!(validate_upc("").is_err());
        assert!(validate_upc(&"9".repeat(21)).is_err());
        assert!(validate_upc("12 34").is_err());
    }
}
