use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The identity attached to a request or connection. Unauthenticated traffic
/// is the distinguished `Anonymous` actor, not an error.
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    Principal(Principal),
}

impl Actor {
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Anonymous => None,
            Self::Principal(principal) => Some(principal),
        }
    }

    #[must_use]
    pub fn principal_id(&self) -> Option<&str> {
        self.principal().map(|principal| principal.id.as_str())
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Principal(principal) => principal.username.as_str(),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.principal().is_some_and(|principal| principal.is_admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: Option<String>,
    pub text: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub secret_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Audit record for one delivery. `status_code = 0` encodes "not sent":
/// a transport error or the pre-flight non-https refusal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub subscription_id: String,
    pub event_type: String,
    pub payload: Value,
    pub request_headers: Value,
    pub status_code: u16,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ScheduleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown schedule status: {other}")),
        }
    }

    /// Statuses the reminder sweep considers live.
    #[must_use]
    pub fn is_remindable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub timezone: String,
    pub status: ScheduleStatus,
    pub reminder_at: Option<DateTime<Utc>>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Stage,
    Prod,
    Global,
    Unknown,
}

impl Environment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Stage => "stage",
            Self::Prod => "prod",
            Self::Global => "global",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "dev" => Self::Dev,
            "stage" => Self::Stage,
            "prod" => Self::Prod,
            "global" => Self::Global,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Running,
    Failed,
    Degraded,
    Pending,
    Stopped,
    Unknown,
}

impl ResourceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Degraded => "degraded",
            Self::Pending => "pending",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "running" => Self::Running,
            "failed" => Self::Failed,
            "degraded" => Self::Degraded,
            "pending" => Self::Pending,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

pub const RESOURCE_TYPES: &[&str] = &[
    "pipeline",
    "container",
    "kubernetes_pod",
    "kubernetes_deployment",
    "kubernetes_service",
    "api_route",
    "api_gateway",
    "monitoring_alert",
    "group_runner",
    "runner",
    "environment",
    "storage_bucket",
    "storage_volume",
    "workspace",
    "operational_task",
    "domain",
    "secret",
    "load_balancer",
    "cdn_distribution",
    "compute_instance",
];

#[must_use]
pub fn is_known_resource_type(value: &str) -> bool {
    RESOURCE_TYPES.contains(&value)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResource {
    pub id: String,
    pub name: String,
    pub resource_type: String,
    pub subsystem: String,
    pub external_id: String,
    pub environment: Environment,
    pub status: ResourceStatus,
    pub health_score: i64,
    pub metadata: Value,
    pub owner_id: Option<String>,
    pub last_synced: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Mutable attributes accepted by the catalog upsert. Identity fields travel
/// separately; everything here overwrites the stored row on each sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceAttrs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(default)]
    pub health_score: Option<i64>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub event_name: String,
    pub payload: Value,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}
