use tracing::info;

use crate::domain::models::ScheduleItem;

/// Receives fired reminders. Delivery beyond this point (mail, push, chat
/// bots) is the sink's concern, not the engine's.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, item: &ScheduleItem);
}

/// Default sink: structured log lines, enough for a single-node deployment
/// and for tailing in development.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, item: &ScheduleItem) {
        info!(
            item_id = %item.id,
            owner_id = %item.owner_id,
            title = %item.title,
            start = %item.start,
            "reminder fired"
        );
    }
}
