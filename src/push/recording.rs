use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use super::{Notification, NotificationReport, Notifier};

/// Notifier keeping every message in memory so tests can assert on them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    rejects_all: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records messages but reports every token as undeliverable.
    pub fn failing() -> Self {
        Self {
            rejects_all: true,
            ..Self::default()
        }
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> BoxFuture<'static, NotificationReport> {
        let sent = self.sent.clone();
        let rejects_all = self.rejects_all;
        Box::pin(async move {
            let report = if rejects_all {
                NotificationReport::all_failed(&notification, "registration token not registered")
            } else {
                NotificationReport {
                    results: notification
                        .tokens
                        .iter()
                        .map(|token| (token.clone(), Ok(())))
                        .collect(),
                }
            };
            sent.lock().unwrap().push(notification);
            report
        })
    }
}
