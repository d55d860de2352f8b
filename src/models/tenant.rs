use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant is the isolation boundary: it owns users (via membership) and
/// service calls. IDs are externally supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    pub id: String,
}
