use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        booking::refund_ratio, notification::booking_link, Booking, BookingStatus, Court,
        Notification, NotificationType, RelatedEntity, Tier, TimeRange, TransactionType,
    },
    ports::{
        clock::ClockPort,
        database::{DatabasePort, Transaction},
        push::PushPort,
    },
};

use super::{broadcast, commit_bookings, deliver, ledger, overlap, DomainLogic, Error};

const CALENDAR_EVENT: &str = "UpdateCalendar";

/// Book a court and pay for it from the wallet straight away
#[derive(Clone, Debug)]
pub struct CreateBookingRequest {
    pub member_id: Uuid,
    pub court_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaidBookingResponse {
    pub booking: Booking,
    pub balance: Decimal,
    pub tier: Tier,
}

impl<D, P, C> Service<CreateBookingRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = PaidBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let range = booking_range(req.start, req.end)?;
            let mut tx = database.begin().await?;
            let court = bookable_court(tx.as_mut(), req.court_id).await?;
            if overlap::has_overlap(tx.as_mut(), court.court_id, &range).await? {
                return Err(Error::SlotConflict);
            }

            let mut booking = new_booking(&court, req.member_id, range, now);
            booking.status = BookingStatus::Confirmed;
            booking.transaction_id =
                pay(tx.as_mut(), &court, &booking, booking.total_price, now).await?;
            tx.save_booking(&booking).await?;
            let (balance, tier) = wallet_state(tx.as_mut(), req.member_id).await?;
            commit_bookings(tx).await?;

            tracing::info!(
                booking_id = %booking.booking_id,
                court_id = %court.court_id,
                "booking confirmed"
            );
            broadcast(push.as_ref(), CALENDAR_EVENT, "New booking created").await;
            Ok(PaidBookingResponse {
                booking,
                balance,
                tier,
            })
        })
    }
}

/// Reserve a slot without paying yet
///
/// The booking holds the court as `PendingPayment` until it is paid with [`PayBookingRequest`] or
/// expired by [`ExpireUnpaidBookingsRequest`].
#[derive(Clone, Debug)]
pub struct HoldBookingRequest {
    pub member_id: Uuid,
    pub court_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl<D, P, C> Service<HoldBookingRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Booking;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HoldBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let range = booking_range(req.start, req.end)?;
            let mut tx = database.begin().await?;
            if tx.member(req.member_id).await?.is_none() {
                return Err(Error::not_found("member", req.member_id));
            }
            let court = bookable_court(tx.as_mut(), req.court_id).await?;
            if overlap::has_overlap(tx.as_mut(), court.court_id, &range).await? {
                return Err(Error::SlotConflict);
            }

            let booking = new_booking(&court, req.member_id, range, now);
            tx.save_booking(&booking).await?;
            commit_bookings(tx).await?;

            broadcast(push.as_ref(), CALENDAR_EVENT, "New booking created").await;
            Ok(booking)
        })
    }
}

/// Pay for a held booking
#[derive(Clone, Debug)]
pub struct PayBookingRequest {
    pub booking_id: Uuid,
    pub member_id: Uuid,
}

impl<D, P, C> Service<PayBookingRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = PaidBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PayBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut booking = tx
                .booking(req.booking_id)
                .await?
                .ok_or(Error::not_found("booking", req.booking_id))?;
            if booking.member_id != req.member_id {
                return Err(Error::Forbidden {
                    entity: "booking",
                    id: booking.booking_id,
                });
            }
            if booking.status != BookingStatus::PendingPayment {
                return Err(Error::InvalidState(
                    format!("booking is {:?}, not awaiting payment", booking.status).into(),
                ));
            }
            let court = tx
                .court(booking.court_id)
                .await?
                .ok_or(Error::not_found("court", booking.court_id))?;

            booking.transaction_id =
                pay(tx.as_mut(), &court, &booking, booking.total_price, now).await?;
            booking.status = BookingStatus::Confirmed;
            tx.save_booking(&booking).await?;
            let (balance, tier) = wallet_state(tx.as_mut(), req.member_id).await?;
            tx.commit().await?;

            Ok(PaidBookingResponse {
                booking,
                balance,
                tier,
            })
        })
    }
}

/// Book the same slot every selected weekday in `[first_day, last_day]`
///
/// Dates that are already taken are skipped. The wallet is debited once for the sessions actually
/// booked.
#[derive(Clone, Debug)]
pub struct CreateRecurringBookingRequest {
    pub member_id: Uuid,
    pub court_id: Uuid,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub days_of_week: Vec<Weekday>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecurringBookingResponse {
    /// Created sessions in date order. The first one is the parent of the series.
    pub bookings: Vec<Booking>,
    /// Matching dates that were already taken
    pub skipped: Vec<NaiveDate>,
    pub total_price: Decimal,
    pub balance: Decimal,
}

impl<D, P, C> Service<CreateRecurringBookingRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = RecurringBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateRecurringBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            if req.days_of_week.is_empty() {
                return Err(Error::InvalidInput("no day of week selected".into()));
            }
            if req.last_day < req.first_day {
                return Err(Error::InvalidInput("date range ends before it starts".into()));
            }
            if req.end_time <= req.start_time {
                return Err(Error::InvalidInput(
                    "session must end after it starts".into(),
                ));
            }

            let mut tx = database.begin().await?;
            let member = tx
                .member(req.member_id)
                .await?
                .ok_or(Error::not_found("member", req.member_id))?;
            if !member.tier().can_book_recurring() {
                return Err(Error::TierRestricted);
            }
            let court = bookable_court(tx.as_mut(), req.court_id).await?;
            let rule = recurrence_rule(&req.days_of_week);

            let mut bookings: Vec<Booking> = Vec::new();
            let mut skipped = Vec::new();
            for day in session_days(req.first_day, req.last_day, &req.days_of_week) {
                let range = booking_range(
                    day.and_time(req.start_time).and_utc(),
                    day.and_time(req.end_time).and_utc(),
                )?;
                if overlap::has_overlap(tx.as_mut(), court.court_id, &range).await? {
                    skipped.push(day);
                    continue;
                }
                let mut booking = new_booking(&court, member.member_id, range, now);
                booking.status = BookingStatus::Confirmed;
                booking.recurrence_rule = Some(rule.clone());
                booking.parent_booking_id = bookings.first().map(|parent| parent.booking_id);
                bookings.push(booking);
            }
            let Some(parent) = bookings.first() else {
                return Err(Error::NoSlotsAvailable);
            };

            let total_price: Decimal = bookings.iter().map(|b| b.total_price).sum();
            let transaction_id = if total_price > Decimal::ZERO {
                let payment = ledger::debit(
                    tx.as_mut(),
                    member.member_id,
                    total_price,
                    TransactionType::Payment,
                    Some(RelatedEntity::Booking(parent.booking_id)),
                    format!(
                        "Recurring booking {} ({} sessions)",
                        court.name,
                        bookings.len()
                    ),
                    now,
                )
                .await?;
                Some(payment.transaction_id)
            } else {
                None
            };
            for booking in bookings.iter_mut() {
                booking.transaction_id = transaction_id;
                tx.save_booking(booking).await?;
            }
            let (balance, _) = wallet_state(tx.as_mut(), member.member_id).await?;
            commit_bookings(tx).await?;

            tracing::info!(
                member_id = %member.member_id,
                created = bookings.len(),
                skipped = skipped.len(),
                %rule,
                "recurring bookings created"
            );
            broadcast(push.as_ref(), CALENDAR_EVENT, "Recurring bookings created").await;
            Ok(RecurringBookingResponse {
                bookings,
                skipped,
                total_price,
                balance,
            })
        })
    }
}

/// Cancel a booking, refunding the owner depending on how early it happens
#[derive(Clone, Debug)]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
    pub acting_member_id: Uuid,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CancelBookingResponse {
    pub booking: Booking,
    pub refund: Decimal,
    pub refund_ratio: Decimal,
}

impl<D, P, C> Service<CancelBookingRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = CancelBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CancelBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut booking = tx
                .booking(req.booking_id)
                .await?
                .ok_or(Error::not_found("booking", req.booking_id))?;
            if booking.member_id != req.acting_member_id && !req.is_admin {
                return Err(Error::Forbidden {
                    entity: "booking",
                    id: booking.booking_id,
                });
            }
            match booking.status {
                BookingStatus::Cancelled => return Err(Error::AlreadyCancelled(booking.booking_id)),
                BookingStatus::Completed => return Err(Error::AlreadyCompleted(booking.booking_id)),
                BookingStatus::PendingPayment | BookingStatus::Confirmed => {}
            }

            let ratio = refund_ratio(booking.range.start - now);
            // Unpaid holds have nothing to give back
            let refund = match booking.transaction_id {
                Some(_) => booking.total_price * ratio,
                None => Decimal::ZERO,
            };
            booking.status = BookingStatus::Cancelled;
            tx.save_booking(&booking).await?;

            let mut notifications = Vec::new();
            if refund > Decimal::ZERO {
                let percent = (ratio * dec!(100)).normalize();
                ledger::credit(
                    tx.as_mut(),
                    booking.member_id,
                    refund,
                    TransactionType::Refund,
                    Some(RelatedEntity::Booking(booking.booking_id)),
                    format!("Cancellation refund ({percent}%)"),
                    now,
                )
                .await?;
                let notification = Notification::new(
                    booking.member_id,
                    format!("Booking cancelled, {refund} refunded ({percent}%)"),
                    NotificationType::Info,
                    Some(booking_link(booking.booking_id)),
                    now,
                );
                tx.save_notification(&notification).await?;
                notifications.push(notification);
            }
            tx.commit().await?;

            tracing::info!(booking_id = %booking.booking_id, %refund, "booking cancelled");
            deliver(push.as_ref(), &notifications).await;
            broadcast(push.as_ref(), CALENDAR_EVENT, "Booking cancelled").await;
            Ok(CancelBookingResponse {
                booking,
                refund,
                refund_ratio: ratio,
            })
        })
    }
}

/// Cancel holds that stayed unpaid for longer than `timeout`
#[derive(Clone, Debug)]
pub struct ExpireUnpaidBookingsRequest {
    pub timeout: Duration,
}

impl<D, P, C> Service<ExpireUnpaidBookingsRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    /// Ids of the bookings cancelled by this pass
    type Response = Vec<Uuid>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExpireUnpaidBookingsRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let cutoff = self.clock.now() - req.timeout;
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut cancelled = Vec::new();
            for mut booking in tx
                .bookings_with_status(BookingStatus::PendingPayment)
                .await?
                .into_iter()
                .filter(|b| b.created_at < cutoff)
            {
                booking.status = BookingStatus::Cancelled;
                tx.save_booking(&booking).await?;
                tracing::debug!(booking_id = %booking.booking_id, "unpaid booking expired");
                cancelled.push(booking.booking_id);
            }
            tx.commit().await?;

            if !cancelled.is_empty() {
                tracing::info!(count = cancelled.len(), "cancelled unpaid bookings");
                broadcast(push.as_ref(), CALENDAR_EVENT, "Unpaid bookings expired").await;
            }
            Ok(cancelled)
        })
    }
}

fn booking_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeRange, Error> {
    TimeRange::new(start, end)
        .ok_or_else(|| Error::InvalidInput("booking must end after it starts".into()))
}

async fn bookable_court(tx: &mut dyn Transaction, court_id: Uuid) -> Result<Court, Error> {
    let court = tx
        .court(court_id)
        .await?
        .ok_or(Error::not_found("court", court_id))?;
    if !court.active {
        return Err(Error::InvalidState(
            format!("court {} is not active", court.name).into(),
        ));
    }
    Ok(court)
}

/// Fresh `PendingPayment` booking priced for `range`
fn new_booking(court: &Court, member_id: Uuid, range: TimeRange, now: DateTime<Utc>) -> Booking {
    Booking {
        booking_id: Uuid::new_v4(),
        court_id: court.court_id,
        member_id,
        total_price: court.price_for(&range),
        range,
        status: BookingStatus::PendingPayment,
        transaction_id: None,
        recurrence_rule: None,
        parent_booking_id: None,
        created_at: now,
    }
}

/// Debit the booking's owner. Free slots produce no wallet transaction.
async fn pay(
    tx: &mut dyn Transaction,
    court: &Court,
    booking: &Booking,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Option<Uuid>, Error> {
    if amount <= Decimal::ZERO {
        return Ok(None);
    }
    let payment = ledger::debit(
        tx,
        booking.member_id,
        amount,
        TransactionType::Payment,
        Some(RelatedEntity::Booking(booking.booking_id)),
        format!(
            "Court booking {} ({} - {})",
            court.name,
            booking.range.start.format("%d/%m/%Y %H:%M"),
            booking.range.end.format("%H:%M")
        ),
        now,
    )
    .await?;
    Ok(Some(payment.transaction_id))
}

async fn wallet_state(tx: &mut dyn Transaction, member_id: Uuid) -> Result<(Decimal, Tier), Error> {
    let member = tx
        .member(member_id)
        .await?
        .ok_or(Error::not_found("member", member_id))?;
    Ok((member.balance(), member.tier()))
}

/// `Weekly;Mon,Thu`, days in week order without duplicates
fn recurrence_rule(days: &[Weekday]) -> String {
    let mut days = days.to_vec();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    let days: Vec<String> = days.iter().map(|d| d.to_string()).collect();
    format!("Weekly;{}", days.join(","))
}

fn session_days(first: NaiveDate, last: NaiveDate, days: &[Weekday]) -> Vec<NaiveDate> {
    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| days.contains(&day.weekday()))
        .collect()
}
