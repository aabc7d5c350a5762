use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    domain::NotificationType,
    ports::push::{Error, PushPort},
};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushMessage {
    Notification {
        message: String,
        kind: NotificationType,
    },
    Event {
        event: String,
        payload: String,
    },
}

/// Broadcast hub for connected clients
///
/// Each member gets a channel of their own; `broadcast` goes to a channel every client listens to.
pub struct PushHub {
    members: DashMap<Uuid, broadcast::Sender<PushMessage>>,
    everyone: broadcast::Sender<PushMessage>,
}

impl PushHub {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            everyone: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to pushes for a member. Creates the channel if needed.
    pub fn subscribe(&self, member_id: Uuid) -> broadcast::Receiver<PushMessage> {
        let sender = self
            .members
            .entry(member_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<PushMessage> {
        self.everyone.subscribe()
    }

    /// Drop a member's channel, e.g. when their last client disconnects.
    pub fn remove(&self, member_id: &Uuid) {
        self.members.remove(member_id);
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PushPort for PushHub {
    /// No-op if the member has no connected client.
    async fn send_to_member(
        &self,
        member_id: Uuid,
        message: &str,
        kind: NotificationType,
    ) -> Result<(), Error> {
        if let Some(sender) = self.members.get(&member_id) {
            let _ = sender.send(PushMessage::Notification {
                message: message.to_string(),
                kind,
            });
        }
        Ok(())
    }

    async fn broadcast(&self, event: &str, payload: &str) -> Result<(), Error> {
        let _ = self.everyone.send(PushMessage::Event {
            event: event.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
