use futures::future::BoxFuture;
use tracing::info;

use super::{Notification, NotificationReport, Notifier};

/// Notifier that only logs messages, used when no push backend is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: Notification) -> BoxFuture<'static, NotificationReport> {
        Box::pin(async move {
            info!(
                title = %notification.title,
                body = %notification.body,
                recipients = notification.tokens.len(),
                "push notification (log only)"
            );
            let results = notification
                .tokens
                .into_iter()
                .map(|token| (token, Ok(())))
                .collect();
            NotificationReport { results }
        })
    }
}
