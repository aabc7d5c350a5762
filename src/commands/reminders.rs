use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, NaiveDate, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        notification::{booking_link, match_link},
        BookingStatus, MatchStatus, Notification, NotificationType,
    },
    ports::{
        clock::ClockPort,
        database::{DatabasePort, Transaction},
        push::PushPort,
    },
};

use super::{deliver, DomainLogic, Error};

/// Remind players and court owners of what they have on tomorrow (UTC)
///
/// A receiver gets at most one reminder per match or booking per day, however often this runs.
#[derive(Clone, Debug, Default)]
pub struct SendRemindersRequest;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendRemindersResponse {
    /// Scheduled matches found for tomorrow
    pub matches: usize,
    /// Confirmed bookings starting tomorrow
    pub bookings: usize,
    /// Reminders created by this pass
    pub sent: usize,
}

impl<D, P, C> Service<SendRemindersRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = SendRemindersResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: SendRemindersRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let today = now.date_naive();
            let tomorrow = today
                .succ_opt()
                .ok_or(Error::InvalidState("calendar overflow".into()))?;
            let mut tx = database.begin().await?;
            let mut response = SendRemindersResponse::default();
            let mut created = Vec::new();

            let matches = tx.matches_on(tomorrow).await?;
            for game in matches.iter().filter(|m| m.status == MatchStatus::Scheduled) {
                response.matches += 1;
                let tournament = match game.tournament_id {
                    Some(id) => tx.tournament(id).await?,
                    None => None,
                };
                let mut message = format!(
                    "Reminder: you have a match tomorrow ({})",
                    game.start_time.format("%d/%m/%Y %H:%M")
                );
                if let Some(tournament) = tournament {
                    message.push_str(&format!(" - {}", tournament.name));
                }
                let link = match_link(game.match_id);
                for player_id in game.players() {
                    let reminder = Reminder {
                        receiver_id: player_id,
                        link: &link,
                        message: &message,
                    };
                    if let Some(notification) = reminder.send_once(tx.as_mut(), now).await? {
                        created.push(notification);
                    }
                }
            }

            let bookings = tx.bookings_with_status(BookingStatus::Confirmed).await?;
            for booking in bookings
                .iter()
                .filter(|b| b.range.start.date_naive() == tomorrow)
            {
                response.bookings += 1;
                let court_name = tx
                    .court(booking.court_id)
                    .await?
                    .map(|court| court.name)
                    .unwrap_or_default();
                let message = format!(
                    "Reminder: you have booked {} tomorrow ({})",
                    court_name,
                    booking.range.start.format("%d/%m/%Y %H:%M")
                );
                let link = booking_link(booking.booking_id);
                let reminder = Reminder {
                    receiver_id: booking.member_id,
                    link: &link,
                    message: &message,
                };
                if let Some(notification) = reminder.send_once(tx.as_mut(), now).await? {
                    created.push(notification);
                }
            }
            tx.commit().await?;

            response.sent = created.len();
            tracing::info!(
                matches = response.matches,
                bookings = response.bookings,
                sent = response.sent,
                "reminders sent"
            );
            deliver(push.as_ref(), &created).await;
            Ok(response)
        })
    }
}

struct Reminder<'a> {
    receiver_id: Uuid,
    link: &'a str,
    message: &'a str,
}

impl Reminder<'_> {
    /// Store the reminder unless the receiver already got one for `link` today
    async fn send_once(
        &self,
        tx: &mut dyn Transaction,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, Error> {
        if self.already_sent(tx, now.date_naive()).await? {
            return Ok(None);
        }
        let notification = Notification::new(
            self.receiver_id,
            self.message,
            NotificationType::Info,
            Some(self.link.to_string()),
            now,
        );
        tx.save_notification(&notification).await?;
        Ok(Some(notification))
    }

    async fn already_sent(&self, tx: &mut dyn Transaction, day: NaiveDate) -> Result<bool, Error> {
        Ok(tx
            .notifications_for(self.receiver_id)
            .await?
            .iter()
            .any(|n| n.link.as_deref() == Some(self.link) && n.created_at.date_naive() == day))
    }
}
