use chrono::{DateTime, Utc};

use crate::{
    domain::{
        error::DomainError,
        models::{ScheduleItem, ScheduleStatus},
    },
    storage::SqliteStore,
};

type ScheduleRow = (
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    i64,
    String,
    String,
    Option<DateTime<Utc>>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

const SCHEDULE_COLUMNS: &str = "item_id, owner_id, title, description, start_at, end_at, all_day, \
     timezone, status, reminder_at, reminder_sent, created_at, updated_at";

impl SqliteStore {
    pub async fn insert_schedule_item(&self, item: &ScheduleItem) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO schedule_items(item_id, owner_id, title, description, start_at, end_at, all_day, timezone, status, reminder_at, reminder_sent, created_at, updated_at) \
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.owner_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.start)
        .bind(item.end)
        .bind(i64::from(item.all_day))
        .bind(&item.timezone)
        .bind(item.status.as_str())
        .bind(item.reminder_at)
        .bind(i64::from(item.reminder_sent))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert schedule item: {error}")))?;
        Ok(())
    }

    pub async fn update_schedule_item(&self, item: &ScheduleItem) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE schedule_items SET title = ?, description = ?, start_at = ?, end_at = ?, all_day = ?, \
             timezone = ?, status = ?, reminder_at = ?, updated_at = ? WHERE item_id = ?",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.start)
        .bind(item.end)
        .bind(i64::from(item.all_day))
        .bind(&item.timezone)
        .bind(item.status.as_str())
        .bind(item.reminder_at)
        .bind(item.updated_at)
        .bind(&item.id)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to update schedule item: {error}")))?;
        Ok(())
    }

    pub async fn get_schedule_item(&self, id: &str) -> Result<Option<ScheduleItem>, DomainError> {
        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedule_items WHERE item_id = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, ScheduleRow>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to get schedule item: {error}")))?;

        row.map(map_schedule_row).transpose()
    }

    /// `owner_id = None` is the admin view: every item, newest start first.
    pub async fn list_schedule_items(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<ScheduleItem>, DomainError> {
        let rows = if let Some(owner_id) = owner_id {
            let query = format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedule_items WHERE owner_id = ? ORDER BY start_at ASC"
            );
            sqlx::query_as::<_, ScheduleRow>(&query)
                .bind(owner_id)
                .fetch_all(self.pool())
                .await
        } else {
            let query =
                format!("SELECT {SCHEDULE_COLUMNS} FROM schedule_items ORDER BY start_at ASC");
            sqlx::query_as::<_, ScheduleRow>(&query).fetch_all(self.pool()).await
        }
        .map_err(|error| DomainError::Storage(format!("failed to list schedule items: {error}")))?;

        rows.into_iter().map(map_schedule_row).collect()
    }

    pub async fn remove_schedule_item(&self, id: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM schedule_items WHERE item_id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to remove schedule item: {error}"))
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Items whose reminder is due: `reminder_at <= now`, not yet sent, and
    /// still in a live status.
    pub async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduleItem>, DomainError> {
        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedule_items \
             WHERE reminder_sent = 0 AND reminder_at IS NOT NULL AND reminder_at <= ? \
             AND status IN ('pending', 'confirmed') ORDER BY reminder_at ASC"
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&query)
            .bind(now)
            .fetch_all(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to list due reminders: {error}")))?;

        rows.into_iter().map(map_schedule_row).collect()
    }

    /// Compare-and-set flip of `reminder_sent`. Returns true only for the
    /// caller that actually performed the transition, so concurrent sweepers
    /// cannot double-fire.
    pub async fn mark_reminder_sent(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE schedule_items SET reminder_sent = 1, updated_at = ? \
             WHERE item_id = ? AND reminder_sent = 0",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to mark reminder sent: {error}")))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_schedule_items(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM schedule_items")
            .fetch_one(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to count schedule items: {error}"))
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_schedule_row(row: ScheduleRow) -> Result<ScheduleItem, DomainError> {
    let (
        id,
        owner_id,
        title,
        description,
        start,
        end,
        all_day,
        timezone,
        status,
        reminder_at,
        reminder_sent,
        created_at,
        updated_at,
    ) = row;

    let status = ScheduleStatus::parse(&status).map_err(DomainError::Storage)?;

    Ok(ScheduleItem {
        id,
        owner_id,
        title,
        description,
        start,
        end,
        all_day: all_day == 1,
        timezone,
        status,
        reminder_at,
        reminder_sent: reminder_sent == 1,
        created_at,
        updated_at,
    })
}
