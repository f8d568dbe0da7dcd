//! Shared pagination query parameters.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Hard cap on page size; larger values are clamped.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of rows to skip
    #[serde(default)]
    pub offset: i64,
    /// Maximum number of rows to return (capped at 100)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// Clamp the parameters to sane bounds.
    pub fn clamped(&self) -> (i64, i64) {
        let offset = self.offset.max(0);
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        (offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(Pagination { offset: -5, limit: 0 }.clamped(), (0, 1));
        assert_eq!(Pagination { offset: 10, limit: 500 }.clamped(), (10, 100));
        assert_eq!(Pagination::default().clamped(), (0, 50));
    }
}
