use chrono::{DateTime, Utc};

use crate::{
    domain::{
        error::DomainError,
        models::{WebhookEvent, WebhookSubscription},
    },
    storage::{SqliteStore, util},
};

type SubscriptionRow = (String, String, String, String, i64, String, DateTime<Utc>);
type EventRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    DateTime<Utc>,
);

impl SqliteStore {
    pub async fn insert_webhook_subscription(
        &self,
        subscription: &WebhookSubscription,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO webhook_subscriptions(subscription_id, owner_id, name, url, active, secret_ref, created_at) \
             VALUES(?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&subscription.id)
        .bind(&subscription.owner_id)
        .bind(&subscription.name)
        .bind(&subscription.url)
        .bind(i64::from(subscription.active))
        .bind(&subscription.secret_ref)
        .bind(subscription.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert subscription: {error}")))?;
        Ok(())
    }

    pub async fn get_webhook_subscription(
        &self,
        id: &str,
    ) -> Result<Option<WebhookSubscription>, DomainError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT subscription_id, owner_id, name, url, active, secret_ref, created_at \
             FROM webhook_subscriptions WHERE subscription_id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to get subscription: {error}")))?;

        Ok(row.map(map_subscription_row))
    }

    pub async fn list_webhook_subscriptions(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<WebhookSubscription>, DomainError> {
        let rows = if let Some(owner_id) = owner_id {
            sqlx::query_as::<_, SubscriptionRow>(
                "SELECT subscription_id, owner_id, name, url, active, secret_ref, created_at \
                 FROM webhook_subscriptions WHERE owner_id = ? ORDER BY created_at ASC",
            )
            .bind(owner_id)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, SubscriptionRow>(
                "SELECT subscription_id, owner_id, name, url, active, secret_ref, created_at \
                 FROM webhook_subscriptions ORDER BY created_at ASC",
            )
            .fetch_all(self.pool())
            .await
        }
        .map_err(|error| DomainError::Storage(format!("failed to list subscriptions: {error}")))?;

        Ok(rows.into_iter().map(map_subscription_row).collect())
    }

    /// The delivery set for a trigger: active subscriptions only.
    pub async fn list_active_webhook_subscriptions(
        &self,
    ) -> Result<Vec<WebhookSubscription>, DomainError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT subscription_id, owner_id, name, url, active, secret_ref, created_at \
             FROM webhook_subscriptions WHERE active = 1 ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|error| {
            DomainError::Storage(format!("failed to list active subscriptions: {error}"))
        })?;

        Ok(rows.into_iter().map(map_subscription_row).collect())
    }

    pub async fn remove_webhook_subscription(&self, id: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE subscription_id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to remove subscription: {error}"))
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Audit rows are append-only; nothing updates or deletes them.
    pub async fn insert_webhook_event(&self, event: &WebhookEvent) -> Result<(), DomainError> {
        let payload_json = util::value_to_json_text(&event.payload).map_err(DomainError::Storage)?;
        let headers_json =
            util::value_to_json_text(&event.request_headers).map_err(DomainError::Storage)?;

        sqlx::query(
            "INSERT INTO webhook_events(event_id, subscription_id, event_type, payload_json, request_headers_json, status_code, response_body, created_at) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.subscription_id)
        .bind(&event.event_type)
        .bind(payload_json)
        .bind(headers_json)
        .bind(i64::from(event.status_code))
        .bind(&event.response_body)
        .bind(event.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert webhook event: {error}")))?;
        Ok(())
    }

    pub async fn list_webhook_events(
        &self,
        subscription_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<WebhookEvent>, DomainError> {
        let mut query = String::from(
            "SELECT event_id, subscription_id, event_type, payload_json, request_headers_json, status_code, response_body, created_at \
             FROM webhook_events",
        );
        if subscription_id.is_some() {
            query.push_str(" WHERE subscription_id = ?");
        }
        query.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = limit {
            query.push_str(" LIMIT ");
            query.push_str(&limit.to_string());
        }

        let rows = if let Some(subscription_id) = subscription_id {
            sqlx::query_as::<_, EventRow>(&query)
                .bind(subscription_id)
                .fetch_all(self.pool())
                .await
        } else {
            sqlx::query_as::<_, EventRow>(&query).fetch_all(self.pool()).await
        }
        .map_err(|error| DomainError::Storage(format!("failed to list webhook events: {error}")))?;

        rows.into_iter().map(map_event_row).collect()
    }

    pub async fn count_webhook_events(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM webhook_events")
            .fetch_one(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to count webhook events: {error}"))
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_subscription_row(row: SubscriptionRow) -> WebhookSubscription {
    let (id, owner_id, name, url, active, secret_ref, created_at) = row;
    WebhookSubscription {
        id,
        owner_id,
        name,
        url,
        active: active == 1,
        secret_ref,
        created_at,
    }
}

fn map_event_row(row: EventRow) -> Result<WebhookEvent, DomainError> {
    let (id, subscription_id, event_type, payload_json, headers_json, status_code, response_body, created_at) =
        row;
    let payload = util::json_text_to_value(&payload_json).map_err(DomainError::Storage)?;
    let request_headers = util::json_text_to_value(&headers_json).map_err(DomainError::Storage)?;
    Ok(WebhookEvent {
        id,
        subscription_id,
        event_type,
        payload,
        request_headers,
        status_code: u16::try_from(status_code).unwrap_or(0),
        response_body,
        created_at,
    })
}
