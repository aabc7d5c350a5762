use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::Notification,
    ports::{clock::ClockPort, database::DatabasePort, push::PushPort},
};

use super::{DomainLogic, Error};

#[derive(Clone, Debug)]
pub struct MarkNotificationReadRequest {
    pub notification_id: Uuid,
    /// Member acting on the notification. Only its receiver may mark it.
    pub member_id: Uuid,
}

impl<D, P, C> Service<MarkNotificationReadRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    type Response = Notification;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MarkNotificationReadRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut notification = tx
                .notification(req.notification_id)
                .await?
                .ok_or(Error::not_found("notification", req.notification_id))?;
            if notification.receiver_id != req.member_id {
                return Err(Error::Forbidden {
                    entity: "notification",
                    id: notification.notification_id,
                });
            }
            if !notification.read {
                notification.read = true;
                tx.save_notification(&notification).await?;
                tx.commit().await?;
            }
            Ok(notification)
        })
    }
}

#[derive(Clone, Debug)]
pub struct MarkAllNotificationsReadRequest {
    pub member_id: Uuid,
}

impl<D, P, C> Service<MarkAllNotificationsReadRequest> for DomainLogic<D, P, C>
where
    D: DatabasePort + 'static,
    P: PushPort + 'static,
    C: ClockPort + 'static,
{
    /// Number of notifications that were unread
    type Response = usize;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MarkAllNotificationsReadRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let mut tx = database.begin().await?;
            let mut marked = 0;
            for mut notification in tx.notifications_for(req.member_id).await? {
                if notification.read {
                    continue;
                }
                notification.read = true;
                tx.save_notification(&notification).await?;
                marked += 1;
            }
            tx.commit().await?;
            Ok(marked)
        })
    }
}
