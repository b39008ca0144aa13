// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie options addressed by key.

use std::time::Duration;

use super::SessionError;
use crate::config::SessionSettings;
use crate::http::CookieOptions;

/// Keys accepted by [`SessionCookieOptions::option`] and
/// [`SessionCookieOptions::set_option`].
pub const OPTION_KEYS: [&str; 5] = ["lifetime", "path", "domain", "secure", "httponly"];

/// Attributes of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionCookieOptions {
    inner: CookieOptions,
}

impl SessionCookieOptions {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            inner: CookieOptions {
                lifetime: settings.lifetime,
                path: settings.path.clone(),
                domain: settings.domain.clone(),
                secure: settings.secure,
                http_only: settings.http_only,
            },
        }
    }

    pub fn cookie_options(&self) -> &CookieOptions {
        &self.inner
    }

    /// Current value of an option in text form. `lifetime` is in seconds,
    /// with 0 meaning a browser-session cookie.
    pub fn option(&self, key: &str) -> Result<String, SessionError> {
        let o = &self.inner;
        Ok(match key {
            "lifetime" => o.lifetime.map(|d| d.as_secs()).unwrap_or(0).to_string(),
            "path" => o.path.clone(),
            "domain" => o.domain.clone().unwrap_or_default(),
            "secure" => on_off(o.secure),
            "httponly" => on_off(o.http_only),
            _ => return Err(SessionError::InvalidOption(key.to_string())),
        })
    }

    pub fn set_option(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        let invalid = || SessionError::InvalidOption(key.to_string());
        let value = value.trim();
        match key {
            "lifetime" => {
                let secs: u64 = value.parse().map_err(|_| invalid())?;
                self.inner.lifetime = (secs > 0).then(|| Duration::from_secs(secs));
            }
            "path" => self.inner.path = value.to_string(),
            "domain" => self.inner.domain = (!value.is_empty()).then(|| value.to_string()),
            "secure" => self.inner.secure = parse_switch(value).ok_or_else(invalid)?,
            "httponly" => self.inner.http_only = parse_switch(value).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        }
        Ok(())
    }

    pub fn set_lifetime(&mut self, lifetime: Option<Duration>) {
        self.inner.lifetime = lifetime.filter(|d| !d.is_zero());
    }
}

fn on_off(flag: bool) -> String {
    let text = if flag { "on" } else { "off" };
    text.to_string()
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}
