//! Notification fan-out pipeline.
//!
//! Three steps, each independently best-effort relative to the HTTP request
//! that triggered it:
//!
//! 1. **Persist** (synchronous): insert the notification row.  A failed
//!    write is logged and swallowed; the parent business operation (friend
//!    request, message, ...) still succeeds.
//! 2. **Socket** (background): emit `new_notification` to the recipient's
//!    live connections.
//! 3. **Web Push** (background): deliver to every registered subscription
//!    with a 24-hour TTL.  A `Gone` outcome deletes exactly that
//!    subscription; other failures are logged and ignored.  No retries, no
//!    backoff, no dead-letter queue.
//!
//! Steps 2 and 3 run on a worker task fed by an unbounded queue, which keeps
//! delivery off the request path while leaving every outcome observable as a
//! [`DeliveryReport`].

use tokio::sync::mpsc;
use tracing::{debug, warn};

use velonet_shared::constants::PUSH_TTL_SECS;
use velonet_shared::events::{NotificationEvent, ServerEvent};
use velonet_store::{NewNotification, Notification};

use crate::push::{PushGateway, PushOutcome, PushPayload, PushPayloadData};
use crate::realtime::Hub;
use crate::state::Db;

/// Handle used by API handlers to fan out a notification.  Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    db: Db,
    jobs: mpsc::UnboundedSender<Notification>,
}

/// What happened to one notification once the worker picked it up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// At least one live socket took the event.
    pub socket_delivered: bool,
    pub push_attempted: usize,
    pub push_delivered: usize,
    /// Subscriptions deleted because the push service reported them gone.
    pub push_pruned: usize,
}

impl Notifier {
    /// Spawn the delivery worker and return the handle.
    pub fn spawn(db: Db, hub: Hub, gateway: Option<std::sync::Arc<dyn PushGateway>>) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Notification>();

        let worker_db = db.clone();
        tokio::spawn(async move {
            while let Some(notification) = queue.recv().await {
                let report =
                    deliver(&worker_db, &hub, gateway.as_deref(), &notification).await;
                debug!(
                    notification = %notification.id,
                    recipient = %notification.recipient_id,
                    socket = report.socket_delivered,
                    push_attempted = report.push_attempted,
                    push_delivered = report.push_delivered,
                    push_pruned = report.push_pruned,
                    "notification delivered"
                );
            }
        });

        Self { db, jobs }
    }

    /// Persist a notification and queue its delivery.
    ///
    /// Returns the stored record, or `None` when the write failed; callers
    /// log nothing and carry on either way.
    pub async fn notify(&self, new: NewNotification) -> Option<Notification> {
        let stored = {
            let db = self.db.lock().await;
            db.insert_notification(&new)
        };

        match stored {
            Ok(notification) => {
                if self.jobs.send(notification.clone()).is_err() {
                    warn!("[notify] delivery worker is gone; realtime/push skipped");
                }
                Some(notification)
            }
            Err(e) => {
                warn!(
                    recipient = %new.recipient_id,
                    kind = %new.kind,
                    error = %e,
                    "[notify] failed to persist notification"
                );
                None
            }
        }
    }
}

/// Run steps 2 and 3 for one stored notification.
pub async fn deliver(
    db: &Db,
    hub: &Hub,
    gateway: Option<&dyn PushGateway>,
    notification: &Notification,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    // Step 2: realtime, only reaches currently-connected devices.
    let event = ServerEvent::NewNotification(to_event(notification));
    report.socket_delivered = hub.send_to_user(notification.recipient_id, &event).await;

    // Step 3: Web Push, one attempt per subscription.
    let Some(gateway) = gateway else {
        return report;
    };

    let subscriptions = {
        let db = db.lock().await;
        db.push_subscriptions_for(notification.recipient_id)
    };
    let subscriptions = match subscriptions {
        Ok(subs) => subs,
        Err(e) => {
            warn!(error = %e, "[notify] could not load push subscriptions");
            return report;
        }
    };
    if subscriptions.is_empty() {
        return report;
    }

    let payload = match serde_json::to_string(&to_payload(notification)) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "[notify] could not serialize push payload");
            return report;
        }
    };

    for subscription in subscriptions {
        let endpoint = subscription.endpoint.clone();
        report.push_attempted += 1;

        match gateway
            .deliver(subscription, payload.clone(), PUSH_TTL_SECS)
            .await
        {
            PushOutcome::Delivered => report.push_delivered += 1,
            PushOutcome::Gone => {
                let deleted = {
                    let db = db.lock().await;
                    db.delete_push_subscription(&endpoint)
                };
                match deleted {
                    Ok(_) => {
                        report.push_pruned += 1;
                        debug!(endpoint = %endpoint, "pruned expired push subscription");
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "[notify] failed to prune subscription");
                    }
                }
            }
            PushOutcome::Failed(reason) => {
                warn!(endpoint = %endpoint, reason = %reason, "[notify] push delivery failed");
            }
        }
    }

    report
}

fn to_event(n: &Notification) -> NotificationEvent {
    NotificationEvent {
        id: n.id,
        recipient_id: n.recipient_id,
        kind: n.kind,
        title: n.title.clone(),
        body: n.body.clone(),
        actor_id: n.actor_id,
        related_id: n.related_id,
        related_kind: n.related_kind.clone(),
        action_url: n.action_url.clone(),
        created_at: n.created_at,
    }
}

fn to_payload(n: &Notification) -> PushPayload {
    PushPayload {
        title: n.title.clone(),
        body: n.body.clone(),
        icon: None,
        badge: None,
        data: PushPayloadData {
            url: n.action_url.clone(),
            kind: n.kind.as_str().to_string(),
        },
        tag: n.id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use velonet_shared::{BikeType, NotificationKind, SkillLevel};
    use velonet_store::{Database, NewProfile, PushSubscription};

    /// Gateway stub reporting a fixed outcome per endpoint.
    struct ScriptedGateway {
        gone_endpoints: Vec<String>,
    }

    impl PushGateway for ScriptedGateway {
        fn deliver(
            &self,
            subscription: PushSubscription,
            _payload: String,
            _ttl_secs: u32,
        ) -> BoxFuture<'static, PushOutcome> {
            let outcome = if self.gone_endpoints.contains(&subscription.endpoint) {
                PushOutcome::Gone
            } else {
                PushOutcome::Delivered
            };
            Box::pin(async move { outcome })
        }
    }

    fn test_db() -> Db {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    async fn profile(db: &Db, user_id: &str) -> Uuid {
        db.lock()
            .await
            .create_profile(&NewProfile {
                user_id: user_id.to_string(),
                display_name: user_id.to_string(),
                bio: None,
                city: None,
                latitude: None,
                longitude: None,
                avatar_url: None,
                skill_level: SkillLevel::Beginner,
                bike_type: BikeType::Road,
            })
            .unwrap()
            .id
    }

    fn notification_for(recipient: Uuid) -> NewNotification {
        NewNotification {
            recipient_id: recipient,
            kind: NotificationKind::FriendRequest,
            title: "New friend request".to_string(),
            body: "someone wants to ride with you".to_string(),
            actor_id: None,
            related_id: None,
            related_kind: None,
            action_url: Some("/friends/requests".to_string()),
        }
    }

    #[tokio::test]
    async fn gone_endpoint_prunes_only_itself() {
        let db = test_db();
        let hub = Hub::new();
        let user = profile(&db, "u").await;

        {
            let guard = db.lock().await;
            guard
                .upsert_push_subscription(user, "https://push/dead", "k1", "a1")
                .unwrap();
            guard
                .upsert_push_subscription(user, "https://push/alive", "k2", "a2")
                .unwrap();
        }

        let stored = {
            let guard = db.lock().await;
            guard.insert_notification(&notification_for(user)).unwrap()
        };

        let gateway = ScriptedGateway {
            gone_endpoints: vec!["https://push/dead".to_string()],
        };
        let report = deliver(&db, &hub, Some(&gateway as &dyn PushGateway), &stored).await;

        assert_eq!(report.push_attempted, 2);
        assert_eq!(report.push_delivered, 1);
        assert_eq!(report.push_pruned, 1);
        assert!(!report.socket_delivered);

        let remaining = db.lock().await.push_subscriptions_for(user).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "https://push/alive");
    }

    #[tokio::test]
    async fn connected_recipient_gets_the_socket_event() {
        let db = test_db();
        let hub = Hub::new();
        let user = profile(&db, "u").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(user, tx).await;

        let stored = {
            let guard = db.lock().await;
            guard.insert_notification(&notification_for(user)).unwrap()
        };

        let report = deliver(&db, &hub, None, &stored).await;
        assert!(report.socket_delivered);
        assert_eq!(report.push_attempted, 0);

        match rx.recv().await {
            Some(ServerEvent::NewNotification(event)) => {
                assert_eq!(event.id, stored.id);
                assert_eq!(event.kind, NotificationKind::FriendRequest);
            }
            other => panic!("expected NewNotification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn notify_persists_and_returns_the_row() {
        let db = test_db();
        let hub = Hub::new();
        let user = profile(&db, "u").await;

        let notifier = Notifier::spawn(db.clone(), hub, None);
        let stored = notifier.notify(notification_for(user)).await;
        assert!(stored.is_some());

        let count = db.lock().await.unread_notification_count(user).unwrap();
        assert_eq!(count, 1);
    }
}
