use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::models::Tenant;

use super::{ConflictError, InvariantViolationError, NotFoundError};

fn map_tenant_row(row: &SqliteRow) -> Tenant {
    Tenant {
        id: row.get("id"),
        created_at: row.get("created_at"),
    }
}

/// Tenant and membership database operations
pub struct TenantRepo;

impl TenantRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Tenant>> {
        let rows = sqlx::query("SELECT * FROM tenants ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_tenant_row).collect())
    }

    pub async fn create(pool: &Pool<Sqlite>, id: &str) -> Result<Tenant> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(ConflictError::new(format!("Tenant already exists: {}", id)).into());
        }

        let now = Utc::now();
        sqlx::query("INSERT INTO tenants (id, created_at) VALUES (?, ?)")
            .bind(id)
            .bind(now)
            .execute(pool)
            .await?;

        Ok(Tenant {
            id: id.to_string(),
            created_at: now,
        })
    }

    /// Delete a tenant. Rejected while member users or service calls still
    /// reference it, so deletion can never orphan required state.
    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<()> {
        let mut tx = pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_none() {
            return Err(NotFoundError::new("Tenant", id).into());
        }

        let (member_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_tenants WHERE tenant_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if member_count > 0 {
            return Err(
                ConflictError::new(format!("Tenant {} still has member users", id)).into(),
            );
        }

        let (call_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM service_calls WHERE tenant_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if call_count > 0 {
            return Err(
                ConflictError::new(format!("Tenant {} still has service calls", id)).into(),
            );
        }

        sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn is_user_in_tenant(
        pool: &Pool<Sqlite>,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM user_tenants WHERE user_id = ? AND tenant_id = ?")
                .bind(user_id)
                .bind(tenant_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn add_user(pool: &Pool<Sqlite>, user_id: &str, tenant_id: &str) -> Result<()> {
        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        if user.is_none() {
            return Err(NotFoundError::new("User", user_id).into());
        }

        let tenant: Option<(String,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?;
        if tenant.is_none() {
            return Err(NotFoundError::new("Tenant", tenant_id).into());
        }

        if Self::is_user_in_tenant(pool, user_id, tenant_id).await? {
            return Err(ConflictError::new(format!(
                "User {} is already a member of tenant {}",
                user_id, tenant_id
            ))
            .into());
        }

        sqlx::query(
            "INSERT INTO user_tenants (user_id, tenant_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a membership. The last-membership check and the delete run in
    /// one transaction so concurrent removals cannot both pass the check and
    /// leave the user with zero tenants.
    pub async fn remove_user(pool: &Pool<Sqlite>, user_id: &str, tenant_id: &str) -> Result<()> {
        let mut tx = pool.begin().await?;

        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(NotFoundError::new("User", user_id).into());
        }

        let memberships: Vec<(String,)> =
            sqlx::query_as("SELECT tenant_id FROM user_tenants WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

        if !memberships.iter().any(|(t,)| t == tenant_id) {
            return Err(NotFoundError::new("Membership", tenant_id).into());
        }
        if memberships.len() == 1 {
            return Err(
                InvariantViolationError::new("User must belong to at least one tenant").into(),
            );
        }

        sqlx::query("DELETE FROM user_tenants WHERE user_id = ? AND tenant_id = ?")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
