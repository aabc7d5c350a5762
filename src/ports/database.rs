use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, Court, Match, Member, Notification, Tournament,
    TournamentParticipant, WalletTransaction,
};

#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabasePort: Send + Sync {
    /// Start a unit of work
    ///
    /// Nothing written through the transaction is visible to others until `commit` succeeds.
    /// Dropping it without committing rolls everything back. Implementations must not let two
    /// concurrent transactions both commit overlapping live bookings on one court, either by
    /// serializing transactions or by rejecting the loser at commit with [`Error::Conflict`].
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error>;
}

#[async_trait::async_trait]
pub trait Transaction: Send {
    async fn member(&mut self, member_id: Uuid) -> Result<Option<Member>, Error>;
    async fn save_member(&mut self, member: &Member) -> Result<(), Error>;

    async fn court(&mut self, court_id: Uuid) -> Result<Option<Court>, Error>;
    async fn save_court(&mut self, court: &Court) -> Result<(), Error>;

    async fn booking(&mut self, booking_id: Uuid) -> Result<Option<Booking>, Error>;
    /// Bookings on a court in any status, ordered by start time
    async fn bookings_for_court(&mut self, court_id: Uuid) -> Result<Vec<Booking>, Error>;
    async fn bookings_with_status(&mut self, status: BookingStatus)
        -> Result<Vec<Booking>, Error>;
    async fn save_booking(&mut self, booking: &Booking) -> Result<(), Error>;

    async fn wallet_transaction(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Option<WalletTransaction>, Error>;
    /// Wallet history of a member, oldest first
    async fn wallet_transactions_for_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<Vec<WalletTransaction>, Error>;
    /// Fails with [`Error::Immutable`] when the stored record is already completed.
    async fn save_wallet_transaction(&mut self, transaction: &WalletTransaction)
        -> Result<(), Error>;

    async fn tournament(&mut self, tournament_id: Uuid) -> Result<Option<Tournament>, Error>;
    async fn save_tournament(&mut self, tournament: &Tournament) -> Result<(), Error>;
    /// Participants of a tournament in registration order
    async fn participants(
        &mut self,
        tournament_id: Uuid,
    ) -> Result<Vec<TournamentParticipant>, Error>;
    async fn save_participant(&mut self, participant: &TournamentParticipant)
        -> Result<(), Error>;

    async fn find_match(&mut self, match_id: Uuid) -> Result<Option<Match>, Error>;
    /// Matches of a tournament ordered by start time
    async fn matches_for_tournament(&mut self, tournament_id: Uuid) -> Result<Vec<Match>, Error>;
    async fn matches_on(&mut self, date: NaiveDate) -> Result<Vec<Match>, Error>;
    /// Returns the number of matches removed
    async fn delete_matches_for_tournament(&mut self, tournament_id: Uuid)
        -> Result<usize, Error>;
    async fn save_match(&mut self, game: &Match) -> Result<(), Error>;

    async fn notification(&mut self, notification_id: Uuid)
        -> Result<Option<Notification>, Error>;
    /// Notifications of a receiver, oldest first
    async fn notifications_for(&mut self, receiver_id: Uuid) -> Result<Vec<Notification>, Error>;
    async fn save_notification(&mut self, notification: &Notification) -> Result<(), Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two live bookings on the same court would overlap
    ///
    /// This is the store's own guard, raised at commit when a concurrent transaction won the slot.
    #[error("bookings {existing} and {conflicting} overlap on court {court_id}")]
    Conflict {
        court_id: Uuid,
        existing: Uuid,
        conflicting: Uuid,
    },

    /// Trying to rewrite a completed wallet transaction
    #[error("wallet transaction {0} is completed and cannot change")]
    Immutable(Uuid),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
