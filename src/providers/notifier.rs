// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification collaborator.
//!
//! Fire-and-forget from the caller's point of view: [`notify`] spawns the
//! send and logs any failure. Context values are ids, names and
//! plain-language summaries; never vault plaintext or secrets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::Instrument;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Welcome,
    ConsentRequested,
    ConsentApproved,
    ConsentRejected,
    OrganizationStatusChanged,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Welcome => "welcome",
            Template::ConsentRequested => "consent_requested",
            Template::ConsentApproved => "consent_approved",
            Template::ConsentRejected => "consent_rejected",
            Template::OrganizationStatusChanged => "organization_status_changed",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Template::Welcome => "Welcome to SDE",
            Template::ConsentRequested => "New data request",
            Template::ConsentApproved => "Your data request was approved",
            Template::ConsentRejected => "Your data request was declined",
            Template::OrganizationStatusChanged => "Your organization status changed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification relay rejected the message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        template: Template,
        recipient: &str,
        context: &Map<String, Value>,
    ) -> Result<(), NotifyError>;
}

/// Queue a notification on the runtime and return immediately.
///
/// The send runs on its own task; failures are logged and swallowed. The
/// handle is only useful to tests that want to wait for delivery.
pub fn notify(
    notifier: Arc<dyn Notifier>,
    template: Template,
    recipient: String,
    context: Map<String, Value>,
) -> JoinHandle<()> {
    let send = async move {
        if let Err(e) = notifier.send(template, &recipient, &context).await {
            tracing::warn!(
                error = %e,
                template = template.as_str(),
                operation = "notifier.send",
                "notification failed"
            );
        }
    };
    tokio::spawn(send.in_current_span())
}

/// Logs the template name only. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        template: Template,
        _recipient: &str,
        context: &Map<String, Value>,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            template = template.as_str(),
            context_keys = context.len(),
            "notification (relay disabled)"
        );
        Ok(())
    }
}

/// Posts `{to, from, subject, template, context}` to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct MailRelayNotifier {
    endpoint: Url,
    api_key: Option<String>,
    sender: String,
    http: Client,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    template: &'a str,
    context: &'a Map<String, Value>,
}

impl MailRelayNotifier {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        sender: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            api_key,
            sender,
            http,
        })
    }

    async fn post_once(&self, message: &RelayMessage<'_>) -> Result<(), NotifyError> {
        let mut request = self.http.post(self.endpoint.clone()).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!("status {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn send(
        &self,
        template: Template,
        recipient: &str,
        context: &Map<String, Value>,
    ) -> Result<(), NotifyError> {
        let message = RelayMessage {
            to: recipient,
            from: &self.sender,
            subject: template.subject(),
            template: template.as_str(),
            context,
        };

        match self.post_once(&message).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::debug!(error = %first, template = template.as_str(), "retrying notification");
                self.post_once(&message).await
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(Template, String, Map<String, Value>)>>,
    }

    impl RecordingNotifier {
        /// Yield to spawned sends until `template` has been recorded.
        pub async fn wait_for(&self, template: Template) {
            for _ in 0..1000 {
                if self.last_for(template).is_some() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        }

        pub fn templates(&self) -> Vec<Template> {
            self.sent
                .lock()
                .map(|sent| sent.iter().map(|(t, _, _)| *t).collect())
                .unwrap_or_default()
        }

        pub fn last_for(&self, template: Template) -> Option<(String, Map<String, Value>)> {
            self.sent.lock().ok().and_then(|sent| {
                sent.iter()
                    .rev()
                    .find(|(t, _, _)| *t == template)
                    .map(|(_, to, ctx)| (to.clone(), ctx.clone()))
            })
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            template: Template,
            recipient: &str,
            context: &Map<String, Value>,
        ) -> Result<(), NotifyError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((template, recipient.to_string(), context.clone()));
            }
            Ok(())
        }
    }

    /// Never completes a send.
    pub struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn send(&self, _: Template, _: &str, _: &Map<String, Value>) -> Result<(), NotifyError> {
            std::future::pending().await
        }
    }

    /// Always fails.
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _: Template, _: &str, _: &Map<String, Value>) -> Result<(), NotifyError> {
            Err(NotifyError::Request("connection refused".to_string()))
        }
    }
}
