use chrono::{DateTime, Utc};

#[mockall::automock]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
