mod service_calls;
mod tenants;
mod users;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::models::*;

/// Typed error for "resource not found" — enables reliable downcast
/// in the API error handler instead of fragile string matching.
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Typed error for uniqueness and referential-integrity violations
#[derive(Debug)]
pub struct ConflictError {
    pub message: String,
}

impl ConflictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConflictError {}

/// Typed error for operations that would break a standing invariant,
/// e.g. removing a user's last tenant membership
#[derive(Debug)]
pub struct InvariantViolationError {
    pub message: String,
}

impl InvariantViolationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for InvariantViolationError {}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        // ":memory:" only makes sense with a single connection: each pooled
        // connection would otherwise see its own empty database.
        let db_url = if db_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", db_path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Tenant Operations ==========

    pub async fn create_tenant(&self, id: &str) -> Result<Tenant> {
        tenants::TenantRepo::create(&self.pool, id).await
    }

    pub async fn delete_tenant(&self, id: &str) -> Result<()> {
        tenants::TenantRepo::delete(&self.pool, id).await
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        tenants::TenantRepo::list(&self.pool).await
    }

    // ========== Membership Operations ==========

    pub async fn is_user_in_tenant(&self, user_id: &str, tenant_id: &str) -> Result<bool> {
        tenants::TenantRepo::is_user_in_tenant(&self.pool, user_id, tenant_id).await
    }

    pub async fn add_user_to_tenant(&self, user_id: &str, tenant_id: &str) -> Result<()> {
        tenants::TenantRepo::add_user(&self.pool, user_id, tenant_id).await
    }

    pub async fn remove_user_from_tenant(&self, user_id: &str, tenant_id: &str) -> Result<()> {
        tenants::TenantRepo::remove_user(&self.pool, user_id, tenant_id).await
    }

    // ========== User Operations ==========

    pub async fn create_user(&self, id: &str, initial_tenant_id: &str) -> Result<User> {
        users::UserRepo::create(&self.pool, id, initial_tenant_id).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        users::UserRepo::delete(&self.pool, id).await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserWithTenants>> {
        users::UserRepo::get(&self.pool, id).await
    }

    // ========== Service Call Operations ==========

    pub async fn create_service_call(
        &self,
        tenant_id: &str,
        name: &str,
        scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
        request: &ProtocolRequest,
    ) -> Result<ServiceCallWithDetails> {
        service_calls::ServiceCallRepo::create(&self.pool, tenant_id, name, scheduled_at, request)
            .await
    }

    pub async fn update_service_call(&self, id: i64, patch: &ServiceCallUpdate) -> Result<()> {
        service_calls::ServiceCallRepo::update(&self.pool, id, patch).await
    }

    pub async fn get_service_calls(&self, tenant_id: &str) -> Result<Vec<ServiceCall>> {
        service_calls::ServiceCallRepo::list(&self.pool, tenant_id).await
    }

    pub async fn get_http_service_call(
        &self,
        tenant_id: &str,
        id: i64,
    ) -> Result<Option<ServiceCallWithDetails>> {
        service_calls::ServiceCallRepo::get_http(&self.pool, tenant_id, id).await
    }

    // ========== Favorite Operations ==========

    pub async fn get_favorites(&self, user_id: &str) -> Result<Vec<i64>> {
        service_calls::ServiceCallRepo::get_favorites(&self.pool, user_id).await
    }

    pub async fn is_favorite(&self, user_id: &str, service_call_id: i64) -> Result<bool> {
        service_calls::ServiceCallRepo::is_favorite(&self.pool, user_id, service_call_id).await
    }

    pub async fn add_favorite(&self, user_id: &str, service_call_id: i64) -> Result<()> {
        service_calls::ServiceCallRepo::add_favorite(&self.pool, user_id, service_call_id).await
    }

    pub async fn remove_favorite(&self, user_id: &str, service_call_id: i64) -> Result<()> {
        service_calls::ServiceCallRepo::remove_favorite(&self.pool, user_id, service_call_id).await
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> Store {
    Store::with_pool_size(":memory:", 1)
        .await
        .expect("in-memory store")
}
