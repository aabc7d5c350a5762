//! Background loops: unpaid-booking expiry and match/booking reminders.
//!
//! Each loop ticks on its own interval. A failed pass is logged and retried on the next tick.

use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tower::ServiceExt;

use crate::{
    commands::{
        bookings::ExpireUnpaidBookingsRequest, reminders::SendRemindersRequest, DomainLogic,
    },
    config::SweeperConfig,
    ports::{clock::ClockPort, database::DatabasePort, push::PushPort},
};

pub struct Sweeper<D, P, C> {
    domain: DomainLogic<D, P, C>,
    config: SweeperConfig,
}

/// Running sweeper. Dropping it without calling [`SweeperHandle::shutdown`] stops the loops too.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<D, P, C> Sweeper<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    pub fn new(domain: DomainLogic<D, P, C>, config: SweeperConfig) -> Self {
        Self { domain, config }
    }

    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, signal) = watch::channel(false);
        let timeout = chrono::Duration::from_std(self.config.unpaid_timeout).unwrap_or_else(|_| {
            let fallback = SweeperConfig::default().unpaid_timeout;
            tracing::warn!(?fallback, "unpaid timeout out of range, using the default");
            chrono::Duration::seconds(fallback.as_secs() as i64)
        });

        let expiry = tokio::spawn(expiry_loop(
            self.domain.clone(),
            self.config.expiry_interval,
            timeout,
            signal.clone(),
        ));
        let reminders = tokio::spawn(reminder_loop(
            self.domain,
            self.config.reminder_interval,
            signal,
        ));
        tracing::info!(
            expiry_interval = ?self.config.expiry_interval,
            unpaid_timeout = ?self.config.unpaid_timeout,
            reminder_interval = ?self.config.reminder_interval,
            "sweeper started"
        );

        SweeperHandle {
            shutdown,
            tasks: vec![expiry, reminders],
        }
    }
}

impl SweeperHandle {
    /// Signal both loops and wait for them to finish their current pass
    pub async fn shutdown(self) {
        // Fails only when both loops are already gone
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "sweeper task failed");
            }
        }
        tracing::info!("sweeper stopped");
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn expiry_loop<D, P, C>(
    domain: DomainLogic<D, P, C>,
    period: Duration,
    timeout: chrono::Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        match domain
            .clone()
            .oneshot(ExpireUnpaidBookingsRequest { timeout })
            .await
        {
            Ok(cancelled) if cancelled.is_empty() => {
                tracing::debug!("no unpaid bookings to expire")
            }
            Ok(cancelled) => {
                tracing::info!(count = cancelled.len(), "expired unpaid bookings")
            }
            Err(err) => tracing::error!(error = %err, "expiry pass failed"),
        }
    }
    tracing::debug!("expiry loop stopped");
}

async fn reminder_loop<D, P, C>(
    domain: DomainLogic<D, P, C>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if let Err(err) = domain.clone().oneshot(SendRemindersRequest).await {
            tracing::error!(error = %err, "reminder pass failed");
        }
    }
    tracing::debug!("reminder loop stopped");
}
