//! In-process notification fan-out to live account sessions.
//!
//! Each account has a room backed by a `tokio::sync::broadcast` channel.
//! Sessions subscribe to their account's room; notifications for accounts
//! with no subscribers are dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::domain::foundation::{AccountId, DomainError};
use crate::ports::{Notifier, PlanChangedMessage};

/// Message delivered to a subscribed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub account_id: AccountId,
    pub channel: String,
    pub message: PlanChangedMessage,
}

pub struct BroadcastNotifier {
    rooms: RwLock<HashMap<AccountId, broadcast::Sender<Notification>>>,
    channel_capacity: usize,
}

impl BroadcastNotifier {
    /// Slow subscribers lose the oldest messages once `channel_capacity`
    /// are buffered.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(64)
    }

    pub async fn subscribe(&self, account_id: &AccountId) -> broadcast::Receiver<Notification> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(account_id.clone())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    pub async fn subscriber_count(&self, account_id: &AccountId) -> usize {
        self.rooms
            .read()
            .await
            .get(account_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drops rooms whose subscribers have all gone away.
    pub async fn prune(&self) {
        self.rooms
            .write()
            .await
            .retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(
        &self,
        account_id: &AccountId,
        channel: &str,
        message: &PlanChangedMessage,
    ) -> Result<(), DomainError> {
        let rooms = self.rooms.read().await;
        if let Some(sender) = rooms.get(account_id) {
            // No live receivers is not a failure
            let _ = sender.send(Notification {
                account_id: account_id.clone(),
                channel: channel.to_string(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{PlanTier, SubscriptionStatus};
    use crate::ports::BILLING_CHANNEL;

    fn message() -> PlanChangedMessage {
        PlanChangedMessage {
            plan: PlanTier::Basic,
            status: SubscriptionStatus::Active,
            feature_mask: 3,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_notification_for_its_account() {
        let notifier = BroadcastNotifier::with_default_capacity();
        let acc1 = AccountId::new("acc1").unwrap();
        let mut rx = notifier.subscribe(&acc1).await;

        notifier.notify(&acc1, BILLING_CHANNEL, &message()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.account_id, acc1);
        assert_eq!(received.channel, "billing");
        assert_eq!(received.message, message());
    }

    #[tokio::test]
    async fn other_accounts_do_not_receive() {
        let notifier = BroadcastNotifier::with_default_capacity();
        let acc1 = AccountId::new("acc1").unwrap();
        let acc2 = AccountId::new("acc2").unwrap();
        let mut rx = notifier.subscribe(&acc2).await;

        notifier.notify(&acc1, BILLING_CHANNEL, &message()).await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_without_subscribers_succeeds() {
        let notifier = BroadcastNotifier::with_default_capacity();
        let acc1 = AccountId::new("acc1").unwrap();

        assert!(notifier.notify(&acc1, BILLING_CHANNEL, &message()).await.is_ok());
    }

    #[tokio::test]
    async fn prune_removes_abandoned_rooms() {
        let notifier = BroadcastNotifier::with_default_capacity();
        let acc1 = AccountId::new("acc1").unwrap();
        let rx = notifier.subscribe(&acc1).await;
        assert_eq!(notifier.subscriber_count(&acc1).await, 1);

        drop(rx);
        notifier.prune().await;

        assert_eq!(notifier.subscriber_count(&acc1).await, 0);
        assert!(notifier.rooms.read().await.is_empty());
    }
}
