// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery of error notifications to support staff.
//!
//! The pipeline runs on blocking worker threads, so [`WebhookNotifier`]
//! hands the HTTP request to the tokio runtime and returns immediately.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A message for support staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub body: String,
    /// Whether `body` is HTML
    pub html: bool,
}

/// Something that can deliver notifications.
pub trait Notifier: Send + Sync {
    /// Queue a notification. Errors are failures detected before delivery.
    fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Posts notifications as JSON to a webhook URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building notification HTTP client")?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .context("no async runtime available to deliver notification")?;
        let request = self.http.post(&self.url).json(notification);
        let subject = notification.subject.clone();

        handle.spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => {
                    tracing::info!(subject = %subject, status = %response.status(), "Notification sent")
                }
                Err(e) => tracing::error!(subject = %subject, error = %e, "Notification failed"),
            }
        });
        Ok(())
    }
}

/// Keeps notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that rejects every notification.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("notification transport unavailable");
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification.clone());
        Ok(())
    }
}
