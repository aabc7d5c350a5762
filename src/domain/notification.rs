use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

/// Durable notification record
///
/// Real-time push is best effort. This record is what the member reliably sees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub receiver_id: Uuid,
    pub message: String,
    pub kind: NotificationType,
    /// Related page, e.g. `/bookings/<id>`
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        receiver_id: Uuid,
        message: impl Into<String>,
        kind: NotificationType,
        link: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            receiver_id,
            message: message.into(),
            kind,
            link,
            read: false,
            created_at,
        }
    }
}

pub fn booking_link(booking_id: Uuid) -> String {
    format!("/bookings/{booking_id}")
}

pub fn match_link(match_id: Uuid) -> String {
    format!("/matches/{match_id}")
}

pub const WALLET_LINK: &str = "/wallet";
