//! Firebase Cloud Messaging delivery through the HTTP v1 API.

use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use super::{Notification, NotificationReport, Notifier};

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/v1/projects";

/// Failures while configuring or talking to FCM.
#[derive(Debug, Error)]
pub enum FcmError {
    /// Required environment variable is missing.
    #[error("missing FCM environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed.
    #[error("failed to build FCM client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[error("failed to send FCM request")]
    RequestSend {
        #[source]
        source: reqwest::Error,
    },
    /// FCM rejected the message.
    #[error("FCM rejected message with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Credentials and project used to reach FCM.
#[derive(Debug, Clone)]
pub struct FcmConfig {
    /// Firebase project the messages are sent from.
    pub project_id: String,
    /// OAuth2 bearer token with the `firebase.messaging` scope.
    pub access_token: String,
}

impl FcmConfig {
    /// Read `FCM_PROJECT_ID` and `FCM_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, FcmError> {
        let project_id = std::env::var("FCM_PROJECT_ID").map_err(|_| FcmError::MissingEnvVar {
            var: "FCM_PROJECT_ID",
        })?;
        let access_token =
            std::env::var("FCM_ACCESS_TOKEN").map_err(|_| FcmError::MissingEnvVar {
                var: "FCM_ACCESS_TOKEN",
            })?;
        Ok(Self {
            project_id,
            access_token,
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: MessageNotification<'a>,
    android: AndroidConfig,
}

#[derive(Serialize)]
struct MessageNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct AndroidConfig {
    priority: &'static str,
}

/// [`Notifier`] backed by FCM; one request per token, sent concurrently.
#[derive(Clone)]
pub struct FcmNotifier {
    client: Client,
    url: Arc<str>,
    access_token: Arc<str>,
}

impl FcmNotifier {
    /// Build the HTTP client for `config`.
    pub fn new(config: FcmConfig) -> Result<Self, FcmError> {
        let client = Client::builder()
            .build()
            .map_err(|source| FcmError::ClientBuilder { source })?;
        let url = format!("{FCM_ENDPOINT}/{}/messages:send", config.project_id);

        Ok(Self {
            client,
            url: url.into(),
            access_token: config.access_token.into(),
        })
    }

    async fn send_one(&self, token: &str, title: &str, body: &str) -> Result<(), FcmError> {
        let request = SendRequest {
            message: Message {
                token,
                notification: MessageNotification { title, body },
                android: AndroidConfig { priority: "high" },
            },
        };

        let response = self
            .client
            .post(self.url.as_ref())
            .bearer_auth(self.access_token.as_ref())
            .json(&request)
            .send()
            .await
            .map_err(|source| FcmError::RequestSend { source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(FcmError::Rejected { status, body })
    }
}

impl Notifier for FcmNotifier {
    fn send(&self, notification: Notification) -> BoxFuture<'static, NotificationReport> {
        let notifier = self.clone();
        Box::pin(async move {
            let Notification {
                title,
                body,
                tokens,
            } = notification;

            let outcomes = join_all(
                tokens
                    .iter()
                    .map(|token| notifier.send_one(token, &title, &body)),
            )
            .await;

            let results = tokens
                .into_iter()
                .zip(outcomes)
                .map(|(token, outcome)| (token, outcome.map_err(|err| err.to_string())))
                .collect();
            NotificationReport { results }
        })
    }
}
