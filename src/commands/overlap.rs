use uuid::Uuid;

use crate::{domain::TimeRange, ports::database::Transaction};

use super::Error;

/// Does `range` collide with a live booking on the court?
///
/// Runs against the state of the caller's unit of work, so bookings inserted earlier in the same
/// transaction count too.
pub async fn has_overlap(
    tx: &mut dyn Transaction,
    court_id: Uuid,
    range: &TimeRange,
) -> Result<bool, Error> {
    let bookings = tx.bookings_for_court(court_id).await?;
    Ok(bookings
        .iter()
        .filter(|b| b.status.is_live())
        .any(|b| b.range.overlaps(range)))
}
