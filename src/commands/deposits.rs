//! Two-phase deposits: a member asks, an admin approves or rejects.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use rust_decimal::Decimal;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{
        notification::WALLET_LINK, Notification, NotificationType, TransactionStatus,
        TransactionType, WalletTransaction,
    },
    ports::{
        clock::ClockPort,
        database::{DatabasePort, Transaction},
        push::PushPort,
    },
};

use super::{deliver, ledger, DomainLogic, Error};

#[derive(Clone, Debug)]
pub struct RequestDepositRequest {
    pub member_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl<D, P, C> Service<RequestDepositRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = WalletTransaction;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RequestDepositRequest) -> Self::Future {
        let database = self.database.clone();
        let now = self.clock.now();
        Box::pin(async move {
            if req.amount <= Decimal::ZERO {
                return Err(Error::InvalidAmount(req.amount));
            }
            let mut tx = database.begin().await?;
            if tx.member(req.member_id).await?.is_none() {
                return Err(Error::not_found("member", req.member_id));
            }

            let record = WalletTransaction {
                transaction_id: Uuid::new_v4(),
                member_id: req.member_id,
                amount: req.amount,
                kind: TransactionType::Deposit,
                status: TransactionStatus::Pending,
                related: None,
                description: req
                    .description
                    .unwrap_or_else(|| format!("Deposit request of {}", req.amount)),
                created_at: now,
            };
            tx.save_wallet_transaction(&record).await?;
            tx.commit().await?;

            tracing::info!(
                transaction_id = %record.transaction_id,
                amount = %record.amount,
                "deposit requested"
            );
            Ok(record)
        })
    }
}

#[derive(Clone, Debug)]
pub struct ApproveDepositRequest {
    pub transaction_id: Uuid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApproveDepositResponse {
    pub transaction: WalletTransaction,
    pub balance: Decimal,
}

impl<D, P, C> Service<ApproveDepositRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = ApproveDepositResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApproveDepositRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let pending = pending_deposit(tx.as_mut(), req.transaction_id).await?;
            let (transaction, member) = ledger::settle_pending_credit(tx.as_mut(), pending).await?;

            let notification = Notification::new(
                member.member_id,
                format!(
                    "Deposit of {} approved. Your balance is now {}",
                    transaction.amount,
                    member.balance()
                ),
                NotificationType::Success,
                Some(WALLET_LINK.to_string()),
                now,
            );
            tx.save_notification(&notification).await?;
            tx.commit().await?;

            tracing::info!(transaction_id = %transaction.transaction_id, "deposit approved");
            deliver(push.as_ref(), &[notification]).await;
            Ok(ApproveDepositResponse {
                transaction,
                balance: member.balance(),
            })
        })
    }
}

#[derive(Clone, Debug)]
pub struct RejectDepositRequest {
    pub transaction_id: Uuid,
}

impl<D, P, C> Service<RejectDepositRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = WalletTransaction;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RejectDepositRequest) -> Self::Future {
        let database = self.database.clone();
        let push = self.push.clone();
        let now = self.clock.now();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut transaction = pending_deposit(tx.as_mut(), req.transaction_id).await?;
            transaction.status = TransactionStatus::Rejected;
            tx.save_wallet_transaction(&transaction).await?;

            let notification = Notification::new(
                transaction.member_id,
                format!("Deposit request of {} was rejected", transaction.amount),
                NotificationType::Warning,
                Some(WALLET_LINK.to_string()),
                now,
            );
            tx.save_notification(&notification).await?;
            tx.commit().await?;

            tracing::info!(transaction_id = %transaction.transaction_id, "deposit rejected");
            deliver(push.as_ref(), &[notification]).await;
            Ok(transaction)
        })
    }
}

/// Load a deposit that is still waiting for a decision
async fn pending_deposit(
    tx: &mut dyn Transaction,
    transaction_id: Uuid,
) -> Result<WalletTransaction, Error> {
    let transaction = tx
        .wallet_transaction(transaction_id)
        .await?
        .ok_or(Error::not_found("wallet transaction", transaction_id))?;
    if transaction.kind != TransactionType::Deposit {
        return Err(Error::InvalidState(
            format!("transaction is a {:?}, not a deposit", transaction.kind).into(),
        ));
    }
    if transaction.status != TransactionStatus::Pending {
        return Err(Error::AlreadyProcessed(transaction_id));
    }
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::database::memory::MemoryDatabase,
        commands::test_support::{domain_at, domain_with_push, load_member, now, seed_member},
        ports::push::MockPushPort,
    };
    use mockall::predicate::*;
    use rust_decimal_macros::dec;
    use speculoos::prelude::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_deposit_lifecycle() {
        // GIVEN a member with 50,000
        let database = MemoryDatabase::default();
        let member = seed_member(&database, dec!(50000)).await;
        let mut push = MockPushPort::new();
        push.expect_send_to_member()
            .times(1)
            .with(eq(member.member_id), always(), eq(NotificationType::Success))
            .returning(|_, _, _| Ok(()));
        let domain = domain_with_push(&database, now(), push);

        // WHEN requesting a deposit
        let requested = domain
            .clone()
            .oneshot(RequestDepositRequest {
                member_id: member.member_id,
                amount: dec!(200000),
                description: None,
            })
            .await
            .unwrap();

        // THEN it is pending and the balance is unchanged
        assert_that!(requested.status).is_equal_to(TransactionStatus::Pending);
        assert_that!(load_member(&database, member.member_id).await.balance())
            .is_equal_to(dec!(50000));

        // WHEN approving it
        let approved = domain
            .clone()
            .oneshot(ApproveDepositRequest {
                transaction_id: requested.transaction_id,
            })
            .await;

        // THEN the balance grows by the amount
        assert_that!(approved).is_ok().matches(|res| {
            res.balance == dec!(250000) && res.transaction.status == TransactionStatus::Completed
        });

        // WHEN approving it again
        let again = domain
            .oneshot(ApproveDepositRequest {
                transaction_id: requested.transaction_id,
            })
            .await;

        // THEN it is refused and nothing changes
        assert_that!(again)
            .is_err()
            .matches(|err| {
                matches!(err, Error::AlreadyProcessed(id) if *id == requested.transaction_id)
            });
        assert_that!(load_member(&database, member.member_id).await.balance())
            .is_equal_to(dec!(250000));

        // AND the member has been told, once
        let mut tx = database.begin().await.unwrap();
        let notifications = tx.notifications_for(member.member_id).await.unwrap();
        assert_that!(notifications).has_length(1);
        assert_that!(notifications[0].link.as_deref()).is_equal_to(Some(WALLET_LINK));
    }

    #[tokio::test]
    async fn test_reject_deposit() {
        let database = MemoryDatabase::default();
        let member = seed_member(&database, Decimal::ZERO).await;
        let domain = domain_at(&database, now());
        let requested = domain
            .clone()
            .oneshot(RequestDepositRequest {
                member_id: member.member_id,
                amount: dec!(100000),
                description: Some("Bank transfer".to_string()),
            })
            .await
            .unwrap();

        let rejected = domain
            .clone()
            .oneshot(RejectDepositRequest {
                transaction_id: requested.transaction_id,
            })
            .await;
        let approve_after = domain
            .oneshot(ApproveDepositRequest {
                transaction_id: requested.transaction_id,
            })
            .await;

        assert_that!(rejected)
            .is_ok()
            .matches(|t| t.status == TransactionStatus::Rejected);
        assert_that!(approve_after)
            .is_err()
            .matches(|err| matches!(err, Error::AlreadyProcessed(_)));
        assert_that!(load_member(&database, member.member_id).await.balance())
            .is_equal_to(Decimal::ZERO);
        let mut tx = database.begin().await.unwrap();
        let notifications = tx.notifications_for(member.member_id).await.unwrap();
        assert_that!(notifications)
            .matches(|n| n.len() == 1 && n[0].kind == NotificationType::Warning);
    }

    #[tokio::test]
    async fn test_request_deposit_validation() {
        let database = MemoryDatabase::default();
        let member = seed_member(&database, Decimal::ZERO).await;
        let domain = domain_at(&database, now());

        let negative = domain
            .clone()
            .oneshot(RequestDepositRequest {
                member_id: member.member_id,
                amount: dec!(-1),
                description: None,
            })
            .await;
        let unknown = domain
            .oneshot(RequestDepositRequest {
                member_id: Uuid::new_v4(),
                amount: dec!(1),
                description: None,
            })
            .await;

        assert_that!(negative)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidAmount(_)));
        assert_that!(unknown)
            .is_err()
            .matches(|err| matches!(err, Error::NotFound { entity: "member", .. }));
    }

    #[tokio::test]
    async fn test_approve_non_deposit() {
        // GIVEN a pending record that is not a deposit
        let database = MemoryDatabase::default();
        let member = seed_member(&database, Decimal::ZERO).await;
        let withdrawal = WalletTransaction {
            transaction_id: Uuid::new_v4(),
            member_id: member.member_id,
            amount: dec!(-10000),
            kind: TransactionType::Withdraw,
            status: TransactionStatus::Pending,
            related: None,
            description: "Cash out".to_string(),
            created_at: now(),
        };
        let mut tx = database.begin().await.unwrap();
        tx.save_wallet_transaction(&withdrawal).await.unwrap();
        tx.commit().await.unwrap();
        let domain = domain_at(&database, now());

        // WHEN approving it, or an unknown id
        let res = domain
            .clone()
            .oneshot(ApproveDepositRequest {
                transaction_id: withdrawal.transaction_id,
            })
            .await;
        let missing = domain
            .oneshot(ApproveDepositRequest {
                transaction_id: Uuid::new_v4(),
            })
            .await;

        // THEN both are refused
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidState(_)));
        assert_that!(missing)
            .is_err()
            .matches(|err| matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_decide_on_completed_payment() {
        // GIVEN a booking payment already taken from the wallet
        let database = MemoryDatabase::default();
        let member = seed_member(&database, dec!(100000)).await;
        let mut tx = database.begin().await.unwrap();
        let payment = ledger::debit(
            tx.as_mut(),
            member.member_id,
            dec!(40000),
            TransactionType::Payment,
            None,
            "Court booking",
            now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        let domain = domain_at(&database, now());

        // WHEN an admin tries to approve or reject it as a deposit
        let approved = domain
            .clone()
            .oneshot(ApproveDepositRequest {
                transaction_id: payment.transaction_id,
            })
            .await;
        let rejected = domain
            .oneshot(RejectDepositRequest {
                transaction_id: payment.transaction_id,
            })
            .await;

        // THEN both are refused because it is not a deposit
        assert_that!(approved)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidState(_)));
        assert_that!(rejected)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidState(_)));
        assert_that!(load_member(&database, member.member_id).await.balance)
            .is_equal_to(dec!(60000));
    }
}
