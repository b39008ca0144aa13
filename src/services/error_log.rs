// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only error and exception logs with throttled notifications.
//!
//! Each log has a companion `<log>.info.txt` holding the unix time of the
//! last notification. A new notification goes out when that file is missing
//! or the configured delay has elapsed since.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Utc};

use crate::config::ModuleConfig;
use crate::services::notifier::{Notification, Notifier};
use crate::time_utils::{format_utc_rfc3339, ordinal, unix_now};
use crate::util::{create_dir, debug_html};

/// Outcome of the throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Notified recently; stay quiet.
    Wait,
    /// Never notified before.
    First,
    /// The delay elapsed; include what was logged meanwhile.
    Elapsed,
}

impl Throttle {
    pub fn should_notify(self) -> bool {
        self != Throttle::Wait
    }
}

/// An append-only log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<log>.info.txt`
    pub fn info_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".info.txt");
        PathBuf::from(name)
    }

    /// Append a timestamped entry, creating the file and its directory.
    pub fn append(&self, entry: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            create_dir(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{}] {}", format_utc_rfc3339(Utc::now()), entry)
    }

    /// Current contents; empty when the log does not exist.
    pub fn contents(&self) -> String {
        fs::read_to_string(&self.path).unwrap_or_default()
    }

    pub fn last_notified(&self) -> Option<i64> {
        fs::read_to_string(self.info_path())
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn throttle(&self, delay: Duration, now: i64) -> Throttle {
        match self.last_notified() {
            None if !self.info_path().exists() => Throttle::First,
            // An unreadable info file counts as "long ago".
            None => Throttle::Elapsed,
            Some(last) if last.saturating_add(delay.as_secs() as i64) <= now => Throttle::Elapsed,
            Some(_) => Throttle::Wait,
        }
    }

    pub fn mark_notified(&self, now: i64) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            create_dir(dir)?;
        }
        fs::write(self.info_path(), now.to_string())
    }
}

/// `9:05 pm` and `3rd Mar 2026` for notification bodies.
fn time_and_date() -> (String, String) {
    let now = Utc::now();
    let day = i64::from(now.day());
    (
        now.format("%-I:%M %P").to_string(),
        format!("{day}{} {}", ordinal(day), now.format("%b %Y")),
    )
}

/// Log an error raised by application code and notify support when due.
pub fn report_error(config: &ModuleConfig, notifier: Option<&dyn Notifier>, error: &str) {
    let log = ErrorLog::new(&config.error_log);
    if config.log_errors {
        if let Err(e) = log.append(error) {
            tracing::error!(path = %log.path().display(), error = %e, "Cannot write error log");
        }
    }
    tracing::warn!(module = %config.module, error, "Application error reported");

    if !config.notify_errors {
        return;
    }
    let now = unix_now();
    let throttle = log.throttle(config.error_notify_delay, now);
    if !throttle.should_notify() {
        return;
    }

    let (time, date) = time_and_date();
    let mut body = format!(
        "An error occurred and was saved to the error log at {time} on {date}.\n\n{error}"
    );
    if throttle == Throttle::Elapsed {
        body = format!("{}\n{body}", log.contents());
    }
    let notification = Notification {
        subject: "An error occurred!".to_string(),
        from: config.notify_from.clone(),
        to: config.notify_to.clone(),
        body,
        html: false,
    };
    send(config, notifier, &notification, error);
    if let Err(e) = log.mark_notified(now) {
        tracing::error!(path = %log.info_path().display(), error = %e, "Cannot write notification time");
    }
}

/// Log an unhandled failure (messages outermost first) and notify support
/// when due.
pub fn report_exception(config: &ModuleConfig, notifier: Option<&dyn Notifier>, chain: &[String]) {
    let log = ErrorLog::new(&config.exception_log);
    let entry = format_chain(chain);
    if let Err(e) = log.append(&entry) {
        tracing::error!(path = %log.path().display(), error = %e, "Cannot write exception log");
    }

    if !config.notify_errors {
        return;
    }
    let now = unix_now();
    let throttle = log.throttle(config.exception_notify_delay, now);
    if !throttle.should_notify() {
        return;
    }

    let (time, date) = time_and_date();
    let mut body = format!(
        "<html><head><title>Exception Caught</title></head><body><h1>Exception Caught!</h1>\
         <p>An exception was caught and saved to the exception log at {time} on {date}:</p>"
    );
    for (i, message) in chain.iter().enumerate() {
        let heading = if i == 0 { "Exception" } else { "Caused by" };
        body.push_str(&debug_html(heading, &serde_json::Value::String(message.clone())));
    }
    if throttle == Throttle::Elapsed {
        body.push_str("<p>These are the current contents of the exception log:</p>");
        body.push_str(&debug_html(
            "Exception Log",
            &serde_json::Value::String(log.contents()),
        ));
    }
    body.push_str("</body></html>");

    let notification = Notification {
        subject: "Exception Caught!".to_string(),
        from: config.notify_from.clone(),
        to: config.notify_to.clone(),
        body,
        html: true,
    };
    send(config, notifier, &notification, &entry);
    if let Err(e) = log.mark_notified(now) {
        tracing::error!(path = %log.info_path().display(), error = %e, "Cannot write notification time");
    }
}

fn format_chain(chain: &[String]) -> String {
    let mut entry = String::new();
    for (i, message) in chain.iter().enumerate() {
        let label = if i == 0 { "Exception" } else { "Caused by" };
        entry.push_str(&format!("\n{label}: {message}"));
    }
    entry
}

/// Deliver a notification; failures go to the exception log only.
fn send(
    config: &ModuleConfig,
    notifier: Option<&dyn Notifier>,
    notification: &Notification,
    details: &str,
) {
    let Some(notifier) = notifier else {
        tracing::debug!(subject = %notification.subject, "No notifier configured");
        return;
    };
    match notifier.notify(notification) {
        Ok(()) => tracing::info!(subject = %notification.subject, to = %notification.to, "Notification queued"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to notify support");
            let entry = format!(
                "\nException (caught while notifying {}): {e}\nThis happened while reporting: {details}",
                config.notify_to
            );
            if let Err(log_err) = ErrorLog::new(&config.exception_log).append(&entry) {
                tracing::error!(error = %log_err, "Cannot write exception log");
            }
        }
    }
}
