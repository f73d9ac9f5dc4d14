use std::{
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{
    application::{config::RuntimeConfig, groups::GroupBus},
    dispatch::WebhookDispatcher,
    domain::{
        error::DomainError,
        models::{Actor, Principal},
    },
    providers::ProviderSet,
    scheduler::{NotificationSink, TracingSink},
    security::{auth, rate_limit::AttemptLimiter, secrets::SecretResolver},
    storage::SqliteStore,
};

#[derive(Clone)]
pub struct SharedState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: RuntimeConfig,
    store: SqliteStore,
    groups: GroupBus,
    dispatcher: WebhookDispatcher,
    providers: ProviderSet,
    resolver: SecretResolver,
    sink: Arc<dyn NotificationSink>,
    signup_rate_limiter: AttemptLimiter,
    started_at: Instant,
    booted_at: DateTime<Utc>,
    last_sweep_at: RwLock<Option<DateTime<Utc>>>,
}

impl SharedState {
    pub async fn new(config: RuntimeConfig) -> Result<Self, DomainError> {
        Self::with_sink(config, Arc::new(TracingSink)).await
    }

    /// Test seam: the reminder sink is injectable so sweeps can be observed.
    pub async fn with_sink(
        config: RuntimeConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, DomainError> {
        let store = SqliteStore::connect(&config.db_path).await?;
        let http = reqwest::Client::new();
        let resolver = SecretResolver::new(http.clone());
        let dispatcher = WebhookDispatcher::new(
            http.clone(),
            resolver.clone(),
            config.webhook_retry,
            config.webhook_require_https,
        );
        let providers = ProviderSet::from_env(http);

        Ok(Self {
            inner: Arc::new(InnerState {
                signup_rate_limiter: AttemptLimiter::new(
                    config.signup_max_attempts,
                    config.signup_window,
                ),
                store,
                groups: GroupBus::new(),
                dispatcher,
                providers,
                resolver,
                sink,
                started_at: Instant::now(),
                booted_at: Utc::now(),
                last_sweep_at: RwLock::new(None),
                config,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.inner.store
    }

    #[must_use]
    pub fn groups(&self) -> &GroupBus {
        &self.inner.groups
    }

    #[must_use]
    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderSet {
        &self.inner.providers
    }

    #[must_use]
    pub fn secret_resolver(&self) -> &SecretResolver {
        &self.inner.resolver
    }

    #[must_use]
    pub fn notification_sink(&self) -> &dyn NotificationSink {
        self.inner.sink.as_ref()
    }

    #[must_use]
    pub fn signup_rate_limiter(&self) -> &AttemptLimiter {
        &self.inner.signup_rate_limiter
    }

    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        u64::try_from(self.inner.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Resolve an opaque bearer token to an actor. Unknown or absent tokens
    /// are the Anonymous actor; authorization is per-operation.
    pub async fn resolve_actor(&self, token: Option<&str>) -> Actor {
        let Some(token) = token else {
            return Actor::Anonymous;
        };

        if auth::admin_token_matches(self.inner.config.admin_token.as_deref(), token) {
            return Actor::Principal(auth::admin_principal(self.inner.booted_at));
        }

        match self.inner.store.resolve_token(token).await {
            Ok(Some(principal)) => Actor::Principal(principal),
            Ok(None) => Actor::Anonymous,
            Err(error) => {
                tracing::warn!("token resolution failed: {error}");
                Actor::Anonymous
            }
        }
    }

    pub async fn create_principal_with_token(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(Principal, String), DomainError> {
        let principal = Principal {
            id: format!("usr-{}", uuid::Uuid::new_v4()),
            username: username.to_owned(),
            email: email.to_owned(),
            is_active: true,
            is_admin: false,
            created_at: Utc::now(),
        };
        self.inner.store.insert_principal(&principal).await?;

        let token = uuid::Uuid::new_v4().simple().to_string();
        self.inner
            .store
            .issue_token(&principal.id, &token, principal.created_at)
            .await?;
        Ok((principal, token))
    }

    pub async fn record_sweep(&self, at: DateTime<Utc>) {
        *self.inner.last_sweep_at.write().await = Some(at);
    }

    pub async fn health_payload(&self) -> Result<Value, DomainError> {
        let store = &self.inner.store;
        let last_sweep_at = *self.inner.last_sweep_at.read().await;

        Ok(json!({
            "ok": true,
            "version": self.config().runtime_version,
            "uptime_ms": self.uptime_ms(),
            "provider_configured": self.inner.providers.is_configured(),
            "sweep_enabled": self.config().sweep_enabled,
            "last_sweep_at": last_sweep_at,
            "connections": self.inner.groups.connection_count().await,
            "principals": store.count_principals().await?,
            "chat_messages": store.count_chat_messages().await?,
            "webhook_events": store.count_webhook_events().await?,
            "schedule_items": store.count_schedule_items().await?,
            "platform_resources": store.count_platform_resources().await?,
            "activity_logs": store.count_activity_logs().await?,
        }))
    }

    #[must_use]
    pub fn info_payload(&self) -> Value {
        json!({
            "name": "atrium-core",
            "version": self.config().runtime_version,
            "admin_token_configured": self.config().admin_token.is_some(),
            "sweep_interval_ms": self.config().sweep_interval.as_millis(),
            "db_path": self.config().db_path.display().to_string(),
        })
    }

    pub async fn ready_payload(&self) -> Value {
        json!({
            "ready": true,
            "connections": self.inner.groups.connection_count().await,
            "uptime_ms": self.uptime_ms(),
        })
    }
}
