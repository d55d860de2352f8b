use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use std::collections::HashMap;

use crate::models::*;

use super::NotFoundError;

fn map_service_call_row(row: &SqliteRow) -> Result<ServiceCall> {
    Ok(ServiceCall {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        protocol: Protocol::parse(&row.get::<String, _>("protocol"))?,
        status: ServiceCallStatus::parse(&row.get::<String, _>("status"))?,
        submitted_at: row.get("submitted_at"),
        scheduled_at: row.get("scheduled_at"),
        executed_at: row.get("executed_at"),
    })
}

fn map_http_details_row(row: &SqliteRow) -> Result<HttpServiceCallDetails> {
    Ok(HttpServiceCallDetails {
        service_call_id: row.get("service_call_id"),
        url: row.get("url"),
        method: HttpMethod::parse(&row.get::<String, _>("method"))?,
        request_headers: headers_from_json(row.get("request_headers"))?,
        request_body: row.get("request_body"),
        response_code: row.get("response_code"),
        response_headers: headers_from_json(row.get("response_headers"))?,
        response_body: row.get("response_body"),
    })
}

fn headers_to_json(headers: Option<&HashMap<String, String>>) -> Result<Option<String>> {
    headers
        .map(|h| serde_json::to_string(h).map_err(Into::into))
        .transpose()
}

fn headers_from_json(json: Option<String>) -> Result<Option<HashMap<String, String>>> {
    json.map(|s| serde_json::from_str(&s).map_err(Into::into))
        .transpose()
}

/// Service call and favorite database operations
pub struct ServiceCallRepo;

impl ServiceCallRepo {
    /// Persist the base record and its protocol detail record as one
    /// transaction; a call without its detail is never observable.
    pub async fn create(
        pool: &Pool<Sqlite>,
        tenant_id: &str,
        name: &str,
        scheduled_at: Option<DateTime<Utc>>,
        request: &ProtocolRequest,
    ) -> Result<ServiceCallWithDetails> {
        let mut tx = pool.begin().await?;

        let tenant: Option<(String,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;
        if tenant.is_none() {
            return Err(NotFoundError::new("Tenant", tenant_id).into());
        }

        let submitted_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO service_calls (tenant_id, name, protocol, status, submitted_at, scheduled_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(request.protocol().as_str())
        .bind(ServiceCallStatus::Pending.as_str())
        .bind(submitted_at)
        .bind(scheduled_at)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        let details = match request {
            ProtocolRequest::Http(http) => {
                let request_headers = http.sanitized_headers();
                sqlx::query(
                    r#"
                    INSERT INTO http_service_call_details (service_call_id, url, method, request_headers, request_body)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(&http.url)
                .bind(http.method.as_str())
                .bind(headers_to_json(request_headers.as_ref())?)
                .bind(&http.body)
                .execute(&mut *tx)
                .await?;

                ProtocolDetails::Http(HttpServiceCallDetails {
                    service_call_id: id,
                    url: http.url.clone(),
                    method: http.method,
                    request_headers,
                    request_body: http.body.clone(),
                    response_code: None,
                    response_headers: None,
                    response_body: None,
                })
            }
        };

        tx.commit().await?;

        Ok(ServiceCallWithDetails {
            service_call: ServiceCall {
                id,
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                protocol: request.protocol(),
                status: ServiceCallStatus::Pending,
                submitted_at,
                scheduled_at,
                executed_at: None,
            },
            details,
        })
    }

    /// Apply a terminal-status patch. Status, executed_at, and the response
    /// detail are one transaction so EXECUTED is never observable with empty
    /// response fields.
    pub async fn update(pool: &Pool<Sqlite>, id: i64, patch: &ServiceCallUpdate) -> Result<()> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query("UPDATE service_calls SET status = ?, executed_at = ? WHERE id = ?")
            .bind(patch.status.as_str())
            .bind(patch.executed_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("ServiceCall", &id.to_string()).into());
        }

        if let Some(response) = &patch.response {
            sqlx::query(
                r#"
                UPDATE http_service_call_details
                SET response_code = ?, response_headers = ?, response_body = ?
                WHERE service_call_id = ?
                "#,
            )
            .bind(response.response_code as i64)
            .bind(headers_to_json(Some(&response.response_headers))?)
            .bind(&response.response_body)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list(pool: &Pool<Sqlite>, tenant_id: &str) -> Result<Vec<ServiceCall>> {
        let rows = sqlx::query(
            "SELECT * FROM service_calls WHERE tenant_id = ? ORDER BY submitted_at DESC, id DESC",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;
        rows.iter().map(map_service_call_row).collect()
    }

    /// Fetch one HTTP call with its detail, scoped to the tenant. A call
    /// belonging to another tenant is indistinguishable from an absent one.
    pub async fn get_http(
        pool: &Pool<Sqlite>,
        tenant_id: &str,
        id: i64,
    ) -> Result<Option<ServiceCallWithDetails>> {
        let row = sqlx::query(
            r#"
            SELECT sc.*, d.service_call_id, d.url, d.method,
                   d.request_headers, d.request_body,
                   d.response_code, d.response_headers, d.response_body
            FROM service_calls sc
            JOIN http_service_call_details d ON d.service_call_id = sc.id
            WHERE sc.id = ? AND sc.tenant_id = ?
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ServiceCallWithDetails {
                service_call: map_service_call_row(&row)?,
                details: ProtocolDetails::Http(map_http_details_row(&row)?),
            })),
            None => Ok(None),
        }
    }

    // ========== Favorite Operations ==========

    pub async fn get_favorites(pool: &Pool<Sqlite>, user_id: &str) -> Result<Vec<i64>> {
        let ids: Vec<(i64,)> =
            sqlx::query_as("SELECT service_call_id FROM service_call_favorites WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn is_favorite(
        pool: &Pool<Sqlite>,
        user_id: &str,
        service_call_id: i64,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT service_call_id FROM service_call_favorites WHERE user_id = ? AND service_call_id = ?",
        )
        .bind(user_id)
        .bind(service_call_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    /// Idempotent: adding an existing favorite is a no-op
    pub async fn add_favorite(
        pool: &Pool<Sqlite>,
        user_id: &str,
        service_call_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO service_call_favorites (user_id, service_call_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(service_call_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Idempotent: removing an absent favorite deletes nothing and succeeds
    pub async fn remove_favorite(
        pool: &Pool<Sqlite>,
        user_id: &str,
        service_call_id: i64,
    ) -> Result<()> {
        sqlx::query("DELETE FROM service_call_favorites WHERE user_id = ? AND service_call_id = ?")
            .bind(user_id)
            .bind(service_call_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
