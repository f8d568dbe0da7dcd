//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Role tag attached to every principal. Capabilities derive from it:
/// admins may do everything; requesters create, cancel, approve, and delete
/// their own requests; pickers work any request on the floor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Requester,
    Picker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Requester => "requester",
            Role::Picker => "picker",
        }
    }
}

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            role: db.role,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: super::pagination::Pagination,
}

/// The authenticated principal attached to every request by the auth
/// middleware. Inactive accounts are rejected before this is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin capability: user administration, catalog reload, any workflow op.
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: "Admin role required".to_string(),
            })
        }
    }

    /// Create-capability: requesters and admins may create requests.
    pub fn require_requester(&self) -> Result<(), Error> {
        match self.role {
            Role::Admin | Role::Requester => Ok(()),
            Role::Picker => Err(Error::Forbidden {
                message: "Requester role required".to_string(),
            }),
        }
    }

    /// Picking capability: pickers and admins may work requests.
    pub fn require_picker(&self) -> Result<(), Error> {
        match self.role {
            Role::Admin | Role::Picker => Ok(()),
            Role::Requester => Err(Error::Forbidden {
                message: "Picker role required".to_string(),
            }),
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            role: db.role,
        }
    }
}
