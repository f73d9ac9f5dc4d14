use chrono::{DateTime, Utc};

use crate::{
    domain::{error::DomainError, models::ActivityLog},
    storage::{SqliteStore, util},
};

type ActivityRow = (
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<f64>,
    Option<f64>,
    DateTime<Utc>,
);

impl SqliteStore {
    pub async fn insert_activity_log(&self, log: &ActivityLog) -> Result<(), DomainError> {
        let payload_json = util::value_to_json_text(&log.payload).map_err(DomainError::Storage)?;

        sqlx::query(
            "INSERT INTO activity_logs(log_id, user_id, event_type, event_name, payload_json, ip_address, user_agent, latitude, longitude, created_at) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(&log.event_type)
        .bind(&log.event_name)
        .bind(payload_json)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.latitude)
        .bind(log.longitude)
        .bind(log.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert activity log: {error}")))?;
        Ok(())
    }

    pub async fn list_activity_logs(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityLog>, DomainError> {
        let mut query = String::from(
            "SELECT log_id, user_id, event_type, event_name, payload_json, ip_address, user_agent, latitude, longitude, created_at \
             FROM activity_logs ORDER BY created_at DESC",
        );
        if let Some(limit) = limit {
            query.push_str(" LIMIT ");
            query.push_str(&limit.to_string());
        }

        let rows = sqlx::query_as::<_, ActivityRow>(&query)
            .fetch_all(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to list activity logs: {error}"))
            })?;

        rows.into_iter().map(map_activity_row).collect()
    }

    pub async fn count_activity_logs(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM activity_logs")
            .fetch_one(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to count activity logs: {error}"))
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_activity_row(row: ActivityRow) -> Result<ActivityLog, DomainError> {
    let (id, user_id, event_type, event_name, payload_json, ip_address, user_agent, latitude, longitude, created_at) =
        row;
    let payload = util::json_text_to_value(&payload_json).map_err(DomainError::Storage)?;
    Ok(ActivityLog {
        id,
        user_id,
        event_type,
        event_name,
        payload,
        ip_address,
        user_agent,
        latitude,
        longitude,
        created_at,
    })
}
