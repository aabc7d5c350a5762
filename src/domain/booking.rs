use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECONDS_PER_HOUR: Decimal = dec!(3600);

/// A reservable court
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Court {
    pub court_id: Uuid,
    pub name: String,
    pub price_per_hour: Decimal,
    pub active: bool,
}

impl Court {
    pub fn new(court_id: Uuid, name: impl Into<String>, price_per_hour: Decimal) -> Self {
        Self {
            court_id,
            name: name.into(),
            price_per_hour,
            active: true,
        }
    }

    /// Price of holding the court for `range`
    ///
    /// Fractional hours are charged pro rata, without rounding.
    pub fn price_for(&self, range: &TimeRange) -> Decimal {
        range.hours() * self.price_per_hour
    }
}

/// Half-open time range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Returns `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn hours(&self) -> Decimal {
        Decimal::from(self.duration().num_seconds()) / SECONDS_PER_HOUR
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Live bookings hold their slot. Cancelled and completed ones never block a court.
    pub fn is_live(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::Confirmed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: Uuid,
    pub court_id: Uuid,
    pub member_id: Uuid,
    pub range: TimeRange,
    pub total_price: Decimal,
    pub status: BookingStatus,
    /// Wallet transaction that paid for this booking
    ///
    /// Every session of a recurring series points at the same transaction.
    pub transaction_id: Option<Uuid>,
    /// Recurrence rule shared by a recurring series, e.g. `Weekly;Tue,Thu`
    pub recurrence_rule: Option<String>,
    /// First booking of the recurring series this booking belongs to
    pub parent_booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

/// Share of the price refunded when a booking is cancelled `lead` ahead of its start
pub fn refund_ratio(lead: Duration) -> Decimal {
    if lead >= Duration::hours(24) {
        Decimal::ONE
    } else if lead >= Duration::hours(12) {
        dec!(0.5)
    } else if lead >= Duration::hours(6) {
        dec!(0.25)
    } else {
        Decimal::ZERO
    }
}
