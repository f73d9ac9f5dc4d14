mod activity_store;
mod chat_store;
mod migrations;
mod principal_store;
mod resource_store;
mod schedule_store;
mod sqlite_store;
mod util;
mod webhook_store;

pub use resource_store::{ResourceFilter, ResourceIdentity};
pub use sqlite_store::SqliteStore;
