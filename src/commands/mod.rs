use std::{borrow::Cow, sync::Arc};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::Notification,
    ports::{
        database::{self, Transaction},
        push::PushPort,
    },
};

pub mod bookings;
pub mod deposits;
pub mod ledger;
pub mod notifications;
pub mod overlap;
pub mod reminders;
pub mod tournaments;

pub struct DomainLogic<D, P, C> {
    database: Arc<D>,
    push: Arc<P>,
    clock: Arc<C>,
}

impl<D, P, C> DomainLogic<D, P, C> {
    pub fn new(database: Arc<D>, push: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            database,
            push,
            clock,
        }
    }
}

impl<D, P, C> Clone for DomainLogic<D, P, C> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            push: self.push.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database port error: {0:?}")]
    Database(#[from] database::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("not allowed to act on {entity} {id}")]
    Forbidden { entity: &'static str, id: Uuid },
    #[error("invalid state: {0}")]
    InvalidState(Cow<'static, str>),
    #[error("invalid input: {0}")]
    InvalidInput(Cow<'static, str>),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },
    #[error("the requested slot overlaps an existing booking")]
    SlotConflict,
    #[error("feature restricted to higher membership tiers")]
    TierRestricted,
    #[error("no slot of the recurring series is available")]
    NoSlotsAvailable,
    #[error("at least 2 participants are needed, got {0}")]
    InsufficientParticipants(usize),
    #[error("wallet transaction {0} was already processed")]
    AlreadyProcessed(Uuid),
    #[error("booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),
    #[error("booking {0} is already completed")]
    AlreadyCompleted(Uuid),
    #[error("member {member_id} is already registered")]
    AlreadyRegistered { member_id: Uuid },
    #[error("tournament is full at {0} participants")]
    TournamentFull(usize),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Error::NotFound { entity, id }
    }
}

/// Commit a unit of work that inserted bookings
///
/// The store rejects overlapping live bookings at commit, which is the same outcome as failing
/// the overlap check.
pub(crate) async fn commit_bookings(tx: Box<dyn Transaction>) -> Result<(), Error> {
    tx.commit().await.map_err(|err| match err {
        database::Error::Conflict { .. } => Error::SlotConflict,
        other => other.into(),
    })
}

/// Push freshly committed notifications to their receivers
pub(crate) async fn deliver<P: PushPort + ?Sized>(push: &P, notifications: &[Notification]) {
    for notification in notifications {
        if let Err(err) = push
            .send_to_member(
                notification.receiver_id,
                &notification.message,
                notification.kind,
            )
            .await
        {
            tracing::warn!(
                receiver_id = %notification.receiver_id,
                error = %err,
                "push delivery failed"
            );
        }
    }
}

pub(crate) async fn broadcast<P: PushPort + ?Sized>(push: &P, event: &str, payload: &str) {
    if let Err(err) = push.broadcast(event, payload).await {
        tracing::warn!(event, error = %err, "push broadcast failed");
    }
}
