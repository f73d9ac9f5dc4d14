use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    domain::{
        error::DomainError,
        models::{Environment, PlatformResource, ResourceAttrs, ResourceStatus},
    },
    storage::{SqliteStore, util},
};

type ResourceRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const RESOURCE_COLUMNS: &str = "resource_id, name, resource_type, subsystem, external_id, \
     environment, status, health_score, metadata_json, owner_id, last_synced, created_at";

/// How an incoming sync row is matched against the catalog. External ids win
/// when present; otherwise identity is the name/environment/owner triple
/// within the type.
#[derive(Debug, Clone)]
pub enum ResourceIdentity {
    External {
        resource_type: String,
        external_id: String,
    },
    Named {
        resource_type: String,
        name: String,
        environment: Environment,
        owner_id: Option<String>,
    },
}

impl ResourceIdentity {
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            Self::External { resource_type, .. } | Self::Named { resource_type, .. } => {
                resource_type
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResourceFilter {
    pub environment: Option<String>,
    pub resource_type: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl SqliteStore {
    /// Idempotent catalog upsert. Repeated syncs of the same identity update
    /// the existing row in place and refresh `last_synced`.
    pub async fn sync_platform_resource(
        &self,
        identity: ResourceIdentity,
        attrs: ResourceAttrs,
        now: DateTime<Utc>,
    ) -> Result<PlatformResource, DomainError> {
        let existing = self.find_resource(&identity).await?;

        let mut resource = match existing {
            Some(resource) => resource,
            None => {
                let (external_id, name, environment, owner_id) = match &identity {
                    ResourceIdentity::External { external_id, .. } => (
                        external_id.clone(),
                        attrs.name.clone().unwrap_or_else(|| external_id.clone()),
                        attrs.environment.unwrap_or(Environment::Unknown),
                        attrs.owner_id.clone(),
                    ),
                    ResourceIdentity::Named {
                        name,
                        environment,
                        owner_id,
                        ..
                    } => (String::new(), name.clone(), *environment, owner_id.clone()),
                };

                PlatformResource {
                    id: format!("res-{}", uuid::Uuid::new_v4()),
                    name,
                    resource_type: identity.resource_type().to_owned(),
                    subsystem: String::new(),
                    external_id,
                    environment,
                    status: ResourceStatus::Unknown,
                    health_score: 100,
                    metadata: serde_json::json!({}),
                    owner_id,
                    last_synced: now,
                    created_at: now,
                }
            }
        };

        if let Some(name) = attrs.name {
            resource.name = name;
        }
        if let Some(subsystem) = attrs.subsystem {
            resource.subsystem = subsystem;
        }
        if let Some(environment) = attrs.environment {
            resource.environment = environment;
        }
        if let Some(status) = attrs.status {
            resource.status = status;
        }
        if let Some(health_score) = attrs.health_score {
            resource.health_score = health_score.clamp(0, 100);
        }
        if let Some(metadata) = attrs.metadata {
            resource.metadata = metadata;
        }
        if attrs.owner_id.is_some() {
            resource.owner_id = attrs.owner_id;
        }
        resource.last_synced = now;

        if resource.status == ResourceStatus::Running && resource.health_score < 50 {
            warn!(
                "resource {} reports running with health {}",
                resource.name, resource.health_score
            );
        }

        self.upsert_resource_row(&resource).await?;
        Ok(resource)
    }

    pub async fn get_platform_resource(
        &self,
        id: &str,
    ) -> Result<Option<PlatformResource>, DomainError> {
        let query = format!(
            "SELECT {RESOURCE_COLUMNS} FROM platform_resources WHERE resource_id = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, ResourceRow>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to get resource: {error}")))?;
        row.map(map_resource_row).transpose()
    }

    pub async fn find_workspace_resource(
        &self,
        external_id: &str,
        owner_id: &str,
    ) -> Result<Option<PlatformResource>, DomainError> {
        let query = format!(
            "SELECT {RESOURCE_COLUMNS} FROM platform_resources \
             WHERE resource_type = 'workspace' AND external_id = ? AND owner_id = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, ResourceRow>(&query)
            .bind(external_id)
            .bind(owner_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to find workspace: {error}")))?;
        row.map(map_resource_row).transpose()
    }

    pub async fn list_platform_resources(
        &self,
        filter: &ResourceFilter,
    ) -> Result<Vec<PlatformResource>, DomainError> {
        let mut query = format!("SELECT {RESOURCE_COLUMNS} FROM platform_resources WHERE 1 = 1");
        if filter.environment.is_some() {
            query.push_str(" AND environment = ?");
        }
        if filter.resource_type.is_some() {
            query.push_str(" AND resource_type = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.search.is_some() {
            query.push_str(" AND (name LIKE ? OR subsystem LIKE ?)");
        }
        query.push_str(" ORDER BY last_synced DESC");

        let mut builder = sqlx::query_as::<_, ResourceRow>(&query);
        if let Some(environment) = &filter.environment {
            builder = builder.bind(environment.clone());
        }
        if let Some(resource_type) = &filter.resource_type {
            builder = builder.bind(resource_type.clone());
        }
        if let Some(status) = &filter.status {
            builder = builder.bind(status.clone());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            builder = builder.bind(pattern.clone()).bind(pattern);
        }

        let rows = builder
            .fetch_all(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to list resources: {error}")))?;

        rows.into_iter().map(map_resource_row).collect()
    }

    pub async fn update_resource_status(
        &self,
        id: &str,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE platform_resources SET status = ?, last_synced = ? WHERE resource_id = ?",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to update resource status: {error}")))?;
        Ok(())
    }

    pub async fn count_platform_resources(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM platform_resources")
            .fetch_one(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to count resources: {error}")))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_resource(
        &self,
        identity: &ResourceIdentity,
    ) -> Result<Option<PlatformResource>, DomainError> {
        let row = match identity {
            ResourceIdentity::External {
                resource_type,
                external_id,
            } => {
                let query = format!(
                    "SELECT {RESOURCE_COLUMNS} FROM platform_resources \
                     WHERE resource_type = ? AND external_id = ? LIMIT 1"
                );
                sqlx::query_as::<_, ResourceRow>(&query)
                    .bind(resource_type)
                    .bind(external_id)
                    .fetch_optional(self.pool())
                    .await
            }
            ResourceIdentity::Named {
                resource_type,
                name,
                environment,
                owner_id,
            } => {
                let query = format!(
                    "SELECT {RESOURCE_COLUMNS} FROM platform_resources \
                     WHERE resource_type = ? AND name = ? AND environment = ? \
                     AND external_id = '' AND owner_id IS ? LIMIT 1"
                );
                sqlx::query_as::<_, ResourceRow>(&query)
                    .bind(resource_type)
                    .bind(name)
                    .bind(environment.as_str())
                    .bind(owner_id)
                    .fetch_optional(self.pool())
                    .await
            }
        }
        .map_err(|error| DomainError::Storage(format!("failed to find resource: {error}")))?;

        row.map(map_resource_row).transpose()
    }

    async fn upsert_resource_row(&self, resource: &PlatformResource) -> Result<(), DomainError> {
        let metadata_json =
            util::value_to_json_text(&resource.metadata).map_err(DomainError::Storage)?;

        sqlx::query(
            "INSERT INTO platform_resources(resource_id, name, resource_type, subsystem, external_id, environment, status, health_score, metadata_json, owner_id, last_synced, created_at) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(resource_id) DO UPDATE SET \
             name = excluded.name, subsystem = excluded.subsystem, environment = excluded.environment, \
             status = excluded.status, health_score = excluded.health_score, \
             metadata_json = excluded.metadata_json, owner_id = excluded.owner_id, \
             last_synced = excluded.last_synced",
        )
        .bind(&resource.id)
        .bind(&resource.name)
        .bind(&resource.resource_type)
        .bind(&resource.subsystem)
        .bind(&resource.external_id)
        .bind(resource.environment.as_str())
        .bind(resource.status.as_str())
        .bind(resource.health_score)
        .bind(metadata_json)
        .bind(&resource.owner_id)
        .bind(resource.last_synced)
        .bind(resource.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to upsert resource: {error}")))?;
        Ok(())
    }
}

fn map_resource_row(row: ResourceRow) -> Result<PlatformResource, DomainError> {
    let (
        id,
        name,
        resource_type,
        subsystem,
        external_id,
        environment,
        status,
        health_score,
        metadata_json,
        owner_id,
        last_synced,
        created_at,
    ) = row;

    let metadata = util::json_text_to_value(&metadata_json).map_err(DomainError::Storage)?;

    Ok(PlatformResource {
        id,
        name,
        resource_type,
        subsystem,
        external_id,
        environment: Environment::parse_lossy(&environment),
        status: ResourceStatus::parse_lossy(&status),
        health_score,
        metadata,
        owner_id,
        last_synced,
        created_at,
    })
}
