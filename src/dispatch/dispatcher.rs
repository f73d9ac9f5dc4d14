use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    domain::models::{WebhookEvent, WebhookSubscription},
    security::secrets::SecretResolver,
    storage::SqliteStore,
};

use super::signature::sign_payload;

const SKIPPED_NON_HTTPS: &str = "skipped: non-https";

/// Status codes that justify another attempt; everything else is terminal.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_factor: u32,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_factor: 2,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n + 1` (zero-based `n` counts completed
    /// attempts): base · factorⁿ.
    #[must_use]
    fn backoff_for(&self, completed_attempts: u32) -> Duration {
        let multiplier = self
            .backoff_factor
            .saturating_pow(completed_attempts.saturating_sub(1));
        self.backoff_base.saturating_mul(multiplier)
    }
}

/// Per-subscription outcome reported to the trigger caller.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    http: reqwest::Client,
    resolver: SecretResolver,
    retry: RetryPolicy,
    require_https: bool,
}

enum AttemptResult {
    Response { status: u16, body: String },
    Transport(String),
}

impl WebhookDispatcher {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        resolver: SecretResolver,
        retry: RetryPolicy,
        require_https: bool,
    ) -> Self {
        Self {
            http,
            resolver,
            retry,
            require_https,
        }
    }

    /// Fan an event out to every active subscription. Failures never escape:
    /// each subscription gets an audit row and an entry in the returned list,
    /// and one bad endpoint cannot affect the others.
    pub async fn trigger(
        &self,
        store: &SqliteStore,
        event_type: &str,
        payload: &Value,
    ) -> Vec<DeliveryOutcome> {
        let subscriptions = match store.list_active_webhook_subscriptions().await {
            Ok(subscriptions) => subscriptions,
            Err(error) => {
                warn!("webhook trigger could not load subscriptions: {error}");
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let outcome = self
                .deliver(store, &subscription, event_type, payload)
                .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn deliver(
        &self,
        store: &SqliteStore,
        subscription: &WebhookSubscription,
        event_type: &str,
        payload: &Value,
    ) -> DeliveryOutcome {
        if self.require_https && !subscription.url.starts_with("https://") {
            self.record(
                store,
                subscription,
                event_type,
                payload,
                json!({}),
                0,
                SKIPPED_NON_HTTPS.to_owned(),
            )
            .await;
            return DeliveryOutcome {
                subscription_id: subscription.id.clone(),
                status_code: None,
                error: Some("non-https url".to_owned()),
            };
        }

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(error) => {
                // Unencodable payloads are terminal before any attempt.
                let message = format!("payload serialization failed: {error}");
                self.record(store, subscription, event_type, payload, json!({}), 0, message.clone())
                    .await;
                return DeliveryOutcome {
                    subscription_id: subscription.id.clone(),
                    status_code: None,
                    error: Some(message),
                };
            }
        };

        let mut headers = json!({ "Content-Type": "application/json" });
        if let Some(secret) = self.resolver.resolve(&subscription.secret_ref).await
            && !secret.is_empty()
        {
            headers["X-Signature"] = Value::String(sign_payload(&secret, body.as_bytes()));
        }

        let mut attempts = 0_u32;
        let terminal = loop {
            attempts += 1;
            let result = self.attempt(subscription, &headers, &body).await;

            let retryable = match &result {
                AttemptResult::Response { status, .. } => RETRYABLE_STATUSES.contains(status),
                AttemptResult::Transport(_) => true,
            };

            if !retryable || attempts > self.retry.max_retries {
                break result;
            }

            let delay = self.retry.backoff_for(attempts);
            debug!(
                "webhook retry sub={} attempt={} delay={:?}",
                subscription.id, attempts, delay
            );
            tokio::time::sleep(delay).await;
        };

        match terminal {
            AttemptResult::Response { status, body: response_body } => {
                self.record(store, subscription, event_type, payload, headers, status, response_body)
                    .await;
                DeliveryOutcome {
                    subscription_id: subscription.id.clone(),
                    status_code: Some(status),
                    error: None,
                }
            }
            AttemptResult::Transport(message) => {
                self.record(store, subscription, event_type, payload, headers, 0, message.clone())
                    .await;
                DeliveryOutcome {
                    subscription_id: subscription.id.clone(),
                    status_code: None,
                    error: Some(message),
                }
            }
        }
    }

    async fn attempt(
        &self,
        subscription: &WebhookSubscription,
        headers: &Value,
        body: &str,
    ) -> AttemptResult {
        let mut request = self
            .http
            .post(&subscription.url)
            .timeout(self.retry.request_timeout)
            .body(body.to_owned());

        if let Some(map) = headers.as_object() {
            for (name, value) in map {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                AttemptResult::Response { status, body }
            }
            Err(error) => AttemptResult::Transport(error.to_string()),
        }
    }

    /// One audit row per subscription per trigger, written at the terminal
    /// outcome. Audit failures are logged, never surfaced.
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        store: &SqliteStore,
        subscription: &WebhookSubscription,
        event_type: &str,
        payload: &Value,
        request_headers: Value,
        status_code: u16,
        response_body: String,
    ) {
        let event = WebhookEvent {
            id: format!("whe-{}", uuid::Uuid::new_v4()),
            subscription_id: subscription.id.clone(),
            event_type: event_type.to_owned(),
            payload: payload.clone(),
            request_headers,
            status_code,
            response_body,
            created_at: Utc::now(),
        };

        if let Err(error) = store.insert_webhook_event(&event).await {
            warn!("failed to record webhook event sub={}: {error}", subscription.id);
        }
    }
}
