use uuid::Uuid;

use crate::domain::NotificationType;

/// Real-time delivery to connected clients
///
/// Delivery is fire-and-forget with no retry. Notification records are the durable copy.
#[mockall::automock]
#[async_trait::async_trait]
pub trait PushPort: Send + Sync {
    async fn send_to_member(
        &self,
        member_id: Uuid,
        message: &str,
        kind: NotificationType,
    ) -> Result<(), Error>;

    /// Send `payload` under the `event` topic to every connected client
    async fn broadcast(&self, event: &str, payload: &str) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity or serialization errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
