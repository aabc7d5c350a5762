use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Payment,
    Refund,
    Reward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
    Failed,
}

/// Entity a wallet transaction was made for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedEntity {
    Booking(Uuid),
    Tournament(Uuid),
}

/// Audit record of a balance change
///
/// Once `status` is `Completed` the record is never rewritten: its effect on the balance has been
/// applied exactly once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub transaction_id: Uuid,
    pub member_id: Uuid,
    /// Signed amount
    ///
    /// A positive amount is a credit to the wallet. A negative amount is a debit.
    pub amount: Decimal,
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub related: Option<RelatedEntity>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
