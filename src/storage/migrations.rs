use sqlx::{Executor, SqlitePool};

use crate::domain::error::DomainError;

pub async fn migrate(pool: &SqlitePool) -> Result<(), DomainError> {
    let migration = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS principals (
        principal_id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        is_admin INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS api_tokens (
        token TEXT PRIMARY KEY NOT NULL,
        principal_id TEXT NOT NULL REFERENCES principals(principal_id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_api_tokens_principal ON api_tokens(principal_id);

    CREATE TABLE IF NOT EXISTS chat_rooms (
        room_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chat_messages (
        message_id TEXT PRIMARY KEY NOT NULL,
        room_id TEXT NOT NULL REFERENCES chat_rooms(room_id) ON DELETE CASCADE,
        sender_id TEXT,
        text TEXT NOT NULL,
        metadata_json TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chat_messages_room_created ON chat_messages(room_id, created_at ASC);

    CREATE TABLE IF NOT EXISTS webhook_subscriptions (
        subscription_id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        active INTEGER NOT NULL,
        secret_ref TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_webhook_subscriptions_owner ON webhook_subscriptions(owner_id);

    CREATE TABLE IF NOT EXISTS webhook_events (
        event_id TEXT PRIMARY KEY NOT NULL,
        subscription_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        request_headers_json TEXT NOT NULL,
        status_code INTEGER NOT NULL,
        response_body TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_webhook_events_subscription_created ON webhook_events(subscription_id, created_at DESC);

    CREATE TABLE IF NOT EXISTS schedule_items (
        item_id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        start_at TEXT NOT NULL,
        end_at TEXT,
        all_day INTEGER NOT NULL,
        timezone TEXT NOT NULL,
        status TEXT NOT NULL,
        reminder_at TEXT,
        reminder_sent INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_schedule_items_owner ON schedule_items(owner_id);
    CREATE INDEX IF NOT EXISTS idx_schedule_items_reminder ON schedule_items(reminder_at) WHERE reminder_sent = 0;

    CREATE TABLE IF NOT EXISTS platform_resources (
        resource_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        subsystem TEXT NOT NULL,
        external_id TEXT NOT NULL,
        environment TEXT NOT NULL,
        status TEXT NOT NULL,
        health_score INTEGER NOT NULL,
        metadata_json TEXT NOT NULL,
        owner_id TEXT,
        last_synced TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_platform_resources_external
        ON platform_resources(resource_type, external_id) WHERE external_id != '';
    CREATE INDEX IF NOT EXISTS idx_platform_resources_synced ON platform_resources(last_synced DESC);

    CREATE TABLE IF NOT EXISTS activity_logs (
        log_id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT,
        event_type TEXT NOT NULL,
        event_name TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        ip_address TEXT,
        user_agent TEXT NOT NULL,
        latitude REAL,
        longitude REAL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_activity_logs_created ON activity_logs(created_at DESC);
    "#;

    pool.execute(migration)
        .await
        .map_err(|error| DomainError::Storage(format!("migration failed: {error}")))?;

    Ok(())
}
