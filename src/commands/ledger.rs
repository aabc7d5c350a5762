//! Wallet balance mutations.
//!
//! Every balance change runs inside the caller's unit of work and writes the member together with
//! the matching [`WalletTransaction`], so either both land or neither does.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::{Member, RelatedEntity, TransactionStatus, TransactionType, WalletTransaction},
    ports::database::Transaction,
};

use super::Error;

/// Take `amount` out of a member's wallet
///
/// Fails with [`Error::InsufficientFunds`] when the balance is lower than `amount`; nothing is
/// written in that case.
pub async fn debit(
    tx: &mut dyn Transaction,
    member_id: Uuid,
    amount: Decimal,
    kind: TransactionType,
    related: Option<RelatedEntity>,
    description: impl Into<String> + Send,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, Error> {
    ensure_positive(amount)?;
    let mut member = load(tx, member_id).await?;
    if member.balance < amount {
        return Err(Error::InsufficientFunds {
            balance: member.balance,
            required: amount,
        });
    }

    let previous_tier = member.tier();
    member.balance -= amount;
    member.total_spent += amount;
    if member.tier() != previous_tier {
        tracing::info!(
            %member_id,
            from = ?previous_tier,
            to = ?member.tier(),
            "member tier changed"
        );
    }

    let record = completed(member_id, -amount, kind, related, description.into(), now);
    tx.save_wallet_transaction(&record).await?;
    tx.save_member(&member).await?;
    Ok(record)
}

/// Add `amount` to a member's wallet
///
/// Credits leave the member's total spent untouched.
pub async fn credit(
    tx: &mut dyn Transaction,
    member_id: Uuid,
    amount: Decimal,
    kind: TransactionType,
    related: Option<RelatedEntity>,
    description: impl Into<String> + Send,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, Error> {
    ensure_positive(amount)?;
    let mut member = load(tx, member_id).await?;
    member.balance += amount;

    let record = completed(member_id, amount, kind, related, description.into(), now);
    tx.save_wallet_transaction(&record).await?;
    tx.save_member(&member).await?;
    Ok(record)
}

/// Apply a pending credit and mark it completed
///
/// Used by deposit approval: the record already exists, so only its status changes.
pub(crate) async fn settle_pending_credit(
    tx: &mut dyn Transaction,
    mut record: WalletTransaction,
) -> Result<(WalletTransaction, Member), Error> {
    if record.status != TransactionStatus::Pending {
        return Err(Error::AlreadyProcessed(record.transaction_id));
    }
    ensure_positive(record.amount)?;
    let mut member = load(tx, record.member_id).await?;
    member.balance += record.amount;
    record.status = TransactionStatus::Completed;

    tx.save_wallet_transaction(&record).await?;
    tx.save_member(&member).await?;
    Ok((record, member))
}

fn ensure_positive(amount: Decimal) -> Result<(), Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(())
}

async fn load(tx: &mut dyn Transaction, member_id: Uuid) -> Result<Member, Error> {
    tx.member(member_id)
        .await?
        .ok_or(Error::not_found("member", member_id))
}

fn completed(
    member_id: Uuid,
    amount: Decimal,
    kind: TransactionType,
    related: Option<RelatedEntity>,
    description: String,
    now: DateTime<Utc>,
) -> WalletTransaction {
    WalletTransaction {
        transaction_id: Uuid::new_v4(),
        member_id,
        amount,
        kind,
        status: TransactionStatus::Completed,
        related,
        description,
        created_at: now,
    }
}
