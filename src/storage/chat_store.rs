use chrono::{DateTime, Utc};

use crate::{
    domain::{
        error::DomainError,
        models::{ChatMessage, ChatRoom},
    },
    storage::{SqliteStore, util},
};

type ChatMessageRow = (String, String, Option<String>, String, String, DateTime<Utc>);

impl SqliteStore {
    pub async fn insert_chat_room(&self, room: &ChatRoom) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO chat_rooms(room_id, name, created_at) VALUES(?, ?, ?)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(room.created_at)
            .execute(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to insert chat room: {error}")))?;
        Ok(())
    }

    pub async fn get_chat_room(&self, id: &str) -> Result<Option<ChatRoom>, DomainError> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT room_id, name, created_at FROM chat_rooms WHERE room_id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to get chat room: {error}")))?;

        Ok(row.map(|(id, name, created_at)| ChatRoom { id, name, created_at }))
    }

    pub async fn list_chat_rooms(&self) -> Result<Vec<ChatRoom>, DomainError> {
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT room_id, name, created_at FROM chat_rooms ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to list chat rooms: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, created_at)| ChatRoom { id, name, created_at })
            .collect())
    }

    /// Deleting a room cascades to its messages via the foreign key.
    pub async fn remove_chat_room(&self, id: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM chat_rooms WHERE room_id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|error| DomainError::Storage(format!("failed to remove chat room: {error}")))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), DomainError> {
        let metadata_json =
            util::value_to_json_text(&message.metadata).map_err(DomainError::Storage)?;

        sqlx::query(
            "INSERT INTO chat_messages(message_id, room_id, sender_id, text, metadata_json, created_at) \
             VALUES(?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(metadata_json)
        .bind(message.created_at)
        .execute(self.pool())
        .await
        .map_err(|error| DomainError::Storage(format!("failed to insert chat message: {error}")))?;
        Ok(())
    }

    pub async fn list_chat_messages(
        &self,
        room_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, DomainError> {
        let mut query = String::from(
            "SELECT message_id, room_id, sender_id, text, metadata_json, created_at \
             FROM chat_messages WHERE room_id = ? ORDER BY created_at ASC",
        );
        if let Some(limit) = limit {
            query.push_str(" LIMIT ");
            query.push_str(&limit.to_string());
        }

        let rows = sqlx::query_as::<_, ChatMessageRow>(&query)
            .bind(room_id)
            .fetch_all(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to list chat messages: {error}"))
            })?;

        rows.into_iter().map(map_chat_message_row).collect()
    }

    pub async fn count_chat_messages(&self) -> Result<u64, DomainError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(self.pool())
            .await
            .map_err(|error| {
                DomainError::Storage(format!("failed to count chat messages: {error}"))
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_chat_message_row(row: ChatMessageRow) -> Result<ChatMessage, DomainError> {
    let (id, room_id, sender_id, text, metadata_json, created_at) = row;
    let metadata = util::json_text_to_value(&metadata_json).map_err(DomainError::Storage)?;
    Ok(ChatMessage {
        id,
        room_id,
        sender_id,
        text,
        metadata,
        created_at,
    })
}
