use crate::{
    domain::{
        Booking, BookingStatus, Court, Match, Member, Notification, Tournament,
        TournamentParticipant, TransactionStatus, WalletTransaction,
    },
    ports::database::{DatabasePort, Error, Transaction},
};
use chrono::NaiveDate;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// In-memory store with serializable transactions
///
/// A transaction holds the store lock from `begin` until it is committed or dropped, and works on
/// a private copy of the tables. Commit swaps the copy in, dropping discards it.
#[derive(Clone, Debug)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Clone, Debug, Default)]
struct Tables {
    members: HashMap<Uuid, Member>,
    courts: HashMap<Uuid, Court>,
    bookings: HashMap<Uuid, Booking>,
    // Kept in insertion order
    wallet_transactions: Vec<WalletTransaction>,
    tournaments: HashMap<Uuid, Tournament>,
    participants: Vec<TournamentParticipant>,
    matches: Vec<Match>,
    notifications: Vec<Notification>,
}

impl Tables {
    /// Exclusion constraint: live bookings on one court never overlap.
    fn check_booking_exclusion(&self) -> Result<(), Error> {
        let mut by_court: HashMap<Uuid, Vec<&Booking>> = HashMap::new();
        for booking in self.bookings.values().filter(|b| b.status.is_live()) {
            by_court.entry(booking.court_id).or_default().push(booking);
        }
        for (court_id, mut bookings) in by_court {
            bookings.sort_by_key(|b| b.range.start);
            for pair in bookings.windows(2) {
                if pair[0].range.overlaps(&pair[1].range) {
                    return Err(Error::Conflict {
                        court_id,
                        existing: pair[0].booking_id,
                        conflicting: pair[1].booking_id,
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatabasePort for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error> {
        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTransaction { committed, working }))
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }
}

struct MemoryTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn upsert<T: Clone>(rows: &mut Vec<T>, row: &T, same: impl Fn(&T) -> bool) {
    match rows.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    async fn member(&mut self, member_id: Uuid) -> Result<Option<Member>, Error> {
        Ok(self.working.members.get(&member_id).cloned())
    }

    async fn save_member(&mut self, member: &Member) -> Result<(), Error> {
        self.working
            .members
            .insert(member.member_id, member.clone());
        Ok(())
    }

    async fn court(&mut self, court_id: Uuid) -> Result<Option<Court>, Error> {
        Ok(self.working.courts.get(&court_id).cloned())
    }

    async fn save_court(&mut self, court: &Court) -> Result<(), Error> {
        self.working.courts.insert(court.court_id, court.clone());
        Ok(())
    }

    async fn booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, Error> {
        Ok(self.working.bookings.get(&booking_id).cloned())
    }

    async fn bookings_for_court(&mut self, court_id: Uuid) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .working
            .bookings
            .values()
            .filter(|b| b.court_id == court_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.range.start);
        Ok(bookings)
    }

    async fn bookings_with_status(
        &mut self,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .working
            .bookings
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.created_at, b.range.start));
        Ok(bookings)
    }

    async fn save_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.working
            .bookings
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }

    async fn wallet_transaction(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Option<WalletTransaction>, Error> {
        Ok(self
            .working
            .wallet_transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned())
    }

    async fn wallet_transactions_for_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<Vec<WalletTransaction>, Error> {
        Ok(self
            .working
            .wallet_transactions
            .iter()
            .filter(|t| t.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn save_wallet_transaction(
        &mut self,
        transaction: &WalletTransaction,
    ) -> Result<(), Error> {
        let id = transaction.transaction_id;
        let stored = self
            .working
            .wallet_transactions
            .iter()
            .find(|t| t.transaction_id == id);
        if matches!(stored, Some(t) if t.status == TransactionStatus::Completed) {
            return Err(Error::Immutable(id));
        }
        upsert(&mut self.working.wallet_transactions, transaction, |t| {
            t.transaction_id == id
        });
        Ok(())
    }

    async fn tournament(&mut self, tournament_id: Uuid) -> Result<Option<Tournament>, Error> {
        Ok(self.working.tournaments.get(&tournament_id).cloned())
    }

    async fn save_tournament(&mut self, tournament: &Tournament) -> Result<(), Error> {
        self.working
            .tournaments
            .insert(tournament.tournament_id, tournament.clone());
        Ok(())
    }

    async fn participants(
        &mut self,
        tournament_id: Uuid,
    ) -> Result<Vec<TournamentParticipant>, Error> {
        Ok(self
            .working
            .participants
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn save_participant(
        &mut self,
        participant: &TournamentParticipant,
    ) -> Result<(), Error> {
        let id = participant.participant_id;
        upsert(&mut self.working.participants, participant, |p| {
            p.participant_id == id
        });
        Ok(())
    }

    async fn find_match(&mut self, match_id: Uuid) -> Result<Option<Match>, Error> {
        Ok(self
            .working
            .matches
            .iter()
            .find(|m| m.match_id == match_id)
            .cloned())
    }

    async fn matches_for_tournament(&mut self, tournament_id: Uuid) -> Result<Vec<Match>, Error> {
        let mut matches: Vec<Match> = self
            .working
            .matches
            .iter()
            .filter(|m| m.tournament_id == Some(tournament_id))
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.start_time);
        Ok(matches)
    }

    async fn matches_on(&mut self, date: NaiveDate) -> Result<Vec<Match>, Error> {
        Ok(self
            .working
            .matches
            .iter()
            .filter(|m| m.date == date)
            .cloned()
            .collect())
    }

    async fn delete_matches_for_tournament(
        &mut self,
        tournament_id: Uuid,
    ) -> Result<usize, Error> {
        let before = self.working.matches.len();
        self.working
            .matches
            .retain(|m| m.tournament_id != Some(tournament_id));
        Ok(before - self.working.matches.len())
    }

    async fn save_match(&mut self, game: &Match) -> Result<(), Error> {
        let id = game.match_id;
        upsert(&mut self.working.matches, game, |m| m.match_id == id);
        Ok(())
    }

    async fn notification(
        &mut self,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        Ok(self
            .working
            .notifications
            .iter()
            .find(|n| n.notification_id == notification_id)
            .cloned())
    }

    async fn notifications_for(&mut self, receiver_id: Uuid) -> Result<Vec<Notification>, Error> {
        Ok(self
            .working
            .notifications
            .iter()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .collect())
    }

    async fn save_notification(&mut self, notification: &Notification) -> Result<(), Error> {
        let id = notification.notification_id;
        upsert(&mut self.working.notifications, notification, |n| {
            n.notification_id == id
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryTransaction {
            mut committed,
            working,
        } = *self;
        working.check_booking_exclusion()?;
        *committed = working;
        Ok(())
    }
}
