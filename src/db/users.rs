use anyhow::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::{Tenant, User, UserWithTenants};

use super::{ConflictError, NotFoundError};

/// User database operations
pub struct UserRepo;

impl UserRepo {
    /// Create a user with its initial tenant membership as one unit, so a
    /// user without any membership is never observable.
    pub async fn create(pool: &Pool<Sqlite>, id: &str, tenant_id: &str) -> Result<User> {
        let mut tx = pool.begin().await?;

        let tenant: Option<(String,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;
        if tenant.is_none() {
            return Err(NotFoundError::new("Tenant", tenant_id).into());
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(ConflictError::new(format!("User already exists: {}", id)).into());
        }

        let now = Utc::now();
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_tenants (user_id, tenant_id, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(tenant_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(User {
            id: id.to_string(),
            created_at: now,
        })
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM user_tenants WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM service_call_favorites WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("User", id).into());
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetch a user with its full set of tenants. Absence is not an error.
    pub async fn get(pool: &Pool<Sqlite>, id: &str) -> Result<Option<UserWithTenants>> {
        let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if user.is_none() {
            return Ok(None);
        }

        let tenants: Vec<Tenant> = sqlx::query_as::<_, (String, chrono::DateTime<Utc>)>(
            r#"
            SELECT t.id, t.created_at FROM tenants t
            JOIN user_tenants ut ON ut.tenant_id = t.id
            WHERE ut.user_id = ?
            ORDER BY t.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(id, created_at)| Tenant { id, created_at })
        .collect();

        Ok(Some(UserWithTenants {
            id: id.to_string(),
            tenants,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{test_store, ConflictError, NotFoundError};

    #[tokio::test]
    async fn create_user_requires_existing_tenant() {
        let store = test_store().await;
        let err = store.create_user("u1", "missing").await.unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_id() {
        let store = test_store().await;
        store.create_tenant("t1").await.unwrap();
        store.create_user("u1", "t1").await.unwrap();

        let err = store.create_user("u1", "t1").await.unwrap_err();
        assert!(err.downcast_ref::<ConflictError>().is_some());
    }

    #[tokio::test]
    async fn get_user_returns_full_tenant_set() {
        let store = test_store().await;
        store.create_tenant("t1").await.unwrap();
        store.create_tenant("t2").await.unwrap();
        store.create_user("u1", "t1").await.unwrap();
        store.add_user_to_tenant("u1", "t2").await.unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.id, "u1");
        let mut ids: Vec<&str> = user.tenants.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn get_user_absent_is_none_not_error() {
        let store = test_store().await;
        assert!(store.get_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_user_removes_memberships() {
        let store = test_store().await;
        store.create_tenant("t1").await.unwrap();
        store.create_user("u1", "t1").await.unwrap();

        store.delete_user("u1").await.unwrap();
        assert!(store.get_user("u1").await.unwrap().is_none());
        assert!(!store.is_user_in_tenant("u1", "t1").await.unwrap());

        let err = store.delete_user("u1").await.unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());
    }
}
