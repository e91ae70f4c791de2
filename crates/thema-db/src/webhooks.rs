//! Webhook repository for outbound HTTP notification management (Issue #44).

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use matric_core::{CreateWebhookRequest, Error, Result, Webhook, WebhookDelivery};

/// PostgreSQL webhook repository.
pub struct PgWebhookRepository {
    pool: Pool<Postgres>,
}

impl PgWebhookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a new webhook registration.
    pub async fn create(&self, req: CreateWebhookRequest) -> Result<Uuid> {
        let id = matric_core::new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO webhook (id, url, secret, events, max_retries, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(&req.url)
        .bind(&req.secret)
        .bind(&req.events)
        .bind(req.max_retries)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    /// List all webhooks.
    pub async fn list(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(
            "SELECT id, url, secret, events, is_active, created_at, updated_at,
                    last_triggered_at, failure_count, max_retries
             FROM webhook ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| Self::parse_row(&r)).collect())
    }

    /// Get a webhook by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Webhook>> {
        let row = sqlx::query(
            "SELECT id, url, secret, events, is_active, created_at, updated_at,
                    last_triggered_at, failure_count, max_retries
             FROM webhook WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    /// Delete a webhook.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM webhook WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Update webhook fields. Only non-None fields are updated.
    pub async fn update(
        &self,
        id: Uuid,
        url: Option<&str>,
        events: Option<&[String]>,
        secret: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE webhook SET
                url = COALESCE($1, url),
                events = COALESCE($2, events),
                secret = COALESCE($3, secret),
                is_active = COALESCE($4, is_active),
                updated_at = $5
             WHERE id = $6",
        )
        .bind(url)
        .bind(events)
        .bind(secret)
        .bind(is_active)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// List active webhooks subscribed to a specific event type.
    pub async fn list_active_for_event(&self, event_type: &str) -> Result<Vec<Webhook>> {
        let rows = sqlx::query(
            "SELECT id, url, secret, events, is_active, created_at, updated_at,
                    last_triggered_at, failure_count, max_retries
             FROM webhook
             WHERE is_active = true AND ($1 = ANY(events) OR events = '{}')",
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| Self::parse_row(&r)).collect())
    }

    /// Record a delivery attempt.
    pub async fn record_delivery(
        &self,
        webhook_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
        status_code: Option<i32>,
        response_body: Option<&str>,
        success: bool,
    ) -> Result<()> {
        let id = matric_core::new_v7();
        sqlx::query(
            "INSERT INTO webhook_delivery (id, webhook_id, event_type, payload, status_code, response_body, success)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(webhook_id)
        .bind(event_type)
        .bind(payload)
        .bind(status_code)
        .bind(response_body)
        .bind(success)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Update webhook last_triggered_at and failure tracking
        if success {
            sqlx::query(
                "UPDATE webhook SET last_triggered_at = now(), failure_count = 0, updated_at = now() WHERE id = $1",
            )
            .bind(webhook_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        } else {
            // Increment failure count; auto-disable after 10 consecutive failures
            sqlx::query(
                "UPDATE webhook SET failure_count = failure_count + 1, updated_at = now(),
                 is_active = CASE WHEN failure_count + 1 >= 10 THEN false ELSE is_active END
                 WHERE id = $1",
            )
            .bind(webhook_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        }

        Ok(())
    }

    /// Get delivery history for a webhook.
    pub async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>> {
        let rows = sqlx::query(
            "SELECT id, webhook_id, event_type, payload, status_code, response_body, delivered_at, success
             FROM webhook_delivery
             WHERE webhook_id = $1
             ORDER BY delivered_at DESC
             LIMIT $2",
        )
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| WebhookDelivery {
                id: r.get("id"),
                webhook_id: r.get("webhook_id"),
                event_type: r.get("event_type"),
                payload: r.get("payload"),
                status_code: r.get("status_code"),
                response_body: r.get("response_body"),
                delivered_at: r.get("delivered_at"),
                success: r.get("success"),
            })
            .collect())
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Webhook {
        Webhook {
            id: r.get("id"),
            url: r.get("url"),
            secret: r.get("secret"),
            events: r.get("events"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
            last_triggered_at: r.get("last_triggered_at"),
            failure_count: r.get("failure_count"),
            max_retries: r.get("max_retries"),
        }
    }
}
