use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tenant;

/// User identity. A user always belongs to at least one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// User together with the full set of tenants it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithTenants {
    pub id: String,
    pub tenants: Vec<Tenant>,
}

/// CreateUserRequest creates a user with its initial tenant membership
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub id: String,
    pub tenant_id: String,
}

/// Request body carrying just a user id (signin, add-to-tenant)
#[derive(Debug, Clone, Deserialize)]
pub struct UserIdRequest {
    pub id: String,
}
