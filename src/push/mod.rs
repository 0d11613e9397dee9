//! Push notification delivery.
//!
//! Notifications are fire-and-forget: a [`Notifier`] returns a per-token report which is
//! logged by [`send_and_log`] and never surfaced to callers.

/// Firebase Cloud Messaging delivery.
#[cfg(feature = "fcm-push")]
pub mod fcm;
/// Delivery that only logs.
pub mod log;
#[cfg(test)]
pub mod recording;

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, error};

use crate::dao::models::PlayerEntity;

/// Title, body and recipients of one push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Distinct device tokens, in roster order.
    pub tokens: Vec<String>,
}

impl Notification {
    /// Build a notification addressed to every player that registered a device token.
    ///
    /// Players sharing a device get a single message.
    pub fn to_players<'a>(
        title: impl Into<String>,
        body: impl Into<String>,
        players: impl IntoIterator<Item = &'a PlayerEntity>,
    ) -> Self {
        let tokens = players
            .into_iter()
            .filter_map(|player| player.fcm_token.clone())
            .filter(|token| !token.is_empty())
            .collect::<IndexSet<String>>()
            .into_iter()
            .collect();

        Self {
            title: title.into(),
            body: body.into(),
            tokens,
        }
    }
}

/// Delivery result for every token of a [`Notification`], in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    /// Outcome per token; `Err` holds the transport message.
    pub results: IndexMap<String, Result<(), String>>,
}

impl NotificationReport {
    /// Number of tokens the message was delivered to.
    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    /// Tokens that failed along with the transport error message.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|(token, result)| match result {
            Ok(()) => None,
            Err(message) => Some((token.as_str(), message.as_str())),
        })
    }

    /// Mark every token of `notification` with the same failure.
    pub fn all_failed(notification: &Notification, message: &str) -> Self {
        let results = notification
            .tokens
            .iter()
            .map(|token| (token.clone(), Err(message.to_string())))
            .collect();
        Self { results }
    }
}

/// Abstraction over the push delivery service.
pub trait Notifier: Send + Sync {
    /// Deliver to every token; never fails as a whole.
    fn send(&self, notification: Notification) -> BoxFuture<'static, NotificationReport>;
}

/// Send `notification` and log every failed token. Messages without recipients are skipped.
pub async fn send_and_log(notifier: &dyn Notifier, game_id: &str, notification: Notification) {
    if notification.tokens.is_empty() {
        debug!(game_id, title = %notification.title, "no push tokens; skipping notification");
        return;
    }

    let title = notification.title.clone();
    let report = notifier.send(notification).await;
    for (token, message) in report.failures() {
        error!(game_id, %title, token, error = message, "failed to deliver push notification");
    }
    debug!(
        game_id,
        %title,
        delivered = report.success_count(),
        total = report.results.len(),
        "push notification sent"
    );
}

#[cfg(test)]
mod tests {
    use super::{recording::RecordingNotifier, *};

    #[test]
    fn players_without_tokens_are_skipped() {
        let players = [
            PlayerEntity::new("1", "u1", "Ann", Some("t1".into())),
            PlayerEntity::new("2", "u2", "Bob", None),
            PlayerEntity::new("3", "u3", "Cid", Some(String::new())),
        ];

        let notification = Notification::to_players("T", "B", &players);
        assert_eq!(notification.tokens, vec!["t1".to_string()]);
    }

    #[test]
    fn shared_device_token_is_addressed_once() {
        let players = [
            PlayerEntity::new("1", "u1", "Ann", Some("tablet".into())),
            PlayerEntity::new("2", "u2", "Bob", Some("phone".into())),
            PlayerEntity::new("3", "u3", "Cid", Some("tablet".into())),
        ];

        let notification = Notification::to_players("T", "B", &players);
        assert_eq!(notification.tokens, vec!["tablet".to_string(), "phone".to_string()]);
    }

    #[tokio::test]
    async fn delivery_failures_are_only_logged() {
        let notifier = RecordingNotifier::failing();
        let players = [PlayerEntity::new("1", "u1", "Ann", Some("t1".into()))];

        send_and_log(&notifier, "g1", Notification::to_players("T", "B", &players)).await;

        assert_eq!(notifier.titles(), vec!["T"]);
    }

    #[test]
    fn report_lists_failures_in_order() {
        let mut report = NotificationReport::default();
        report.results.insert("a".into(), Ok(()));
        report.results.insert("b".into(), Err("unregistered".into()));
        report.results.insert("c".into(), Err("quota".into()));

        assert_eq!(report.success_count(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![("b", "unregistered"), ("c", "quota")]);
    }
}
