// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - error logging and notification delivery.

pub mod error_log;
pub mod notifier;

pub use error_log::{report_error, report_exception, ErrorLog};
pub use notifier::{Notification, Notifier, RecordingNotifier, WebhookNotifier};
