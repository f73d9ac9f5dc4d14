use std::{collections::HashMap, sync::Arc};

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Explicit group bus: a named set of realtime connections that jointly
/// receive broadcast frames. Delivery is at-least-once to joined members;
/// there is no ordering across senders and no buffering for absent members.
#[derive(Debug, Clone, Default)]
pub struct GroupBus {
    groups: Arc<RwLock<HashMap<String, HashMap<String, mpsc::UnboundedSender<String>>>>>,
}

impl GroupBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `member` to `group`; returns the receiving end the member's
    /// socket task drains.
    pub async fn join(&self, group: &str, member: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.groups
            .write()
            .await
            .entry(group.to_owned())
            .or_default()
            .insert(member.to_owned(), tx);
        debug!("group join group={group} member={member}");
        rx
    }

    pub async fn leave(&self, group: &str, member: &str) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(member);
            if members.is_empty() {
                groups.remove(group);
            }
        }
        debug!("group leave group={group} member={member}");
    }

    /// Broadcast one frame to every member of the group. Members whose
    /// receiver is gone are dropped from the group on the way through.
    pub async fn send(&self, group: &str, frame: &str) {
        let mut groups = self.groups.write().await;
        let Some(members) = groups.get_mut(group) else {
            return;
        };
        members.retain(|_, sender| sender.send(frame.to_owned()).is_ok());
        if members.is_empty() {
            groups.remove(group);
        }
    }

    pub async fn member_count(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map_or(0, HashMap::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.groups.read().await.values().map(HashMap::len).sum()
    }
}

#[must_use]
pub fn chat_group(room_id: &str) -> String {
    format!("chat_{room_id}")
}

#[must_use]
pub fn docs_group(doc_id: &str) -> String {
    format!("docs_{doc_id}")
}
