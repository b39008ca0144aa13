// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Formatting helpers for views.

use crate::routing::router::{param_pairs, Route};
use crate::util::html_escape;

/// Target of a generated URL. Unset parts default to the current route,
/// except the module which is only included when given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOptions {
    pub module: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    /// Params to add or replace, in order.
    pub params: Vec<(String, String)>,
}

impl UrlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }
}

/// Build a path for `options` relative to `current`.
///
/// The params of the current route are kept; a new param replaces an old
/// one of the same key in place, and other new params are appended.
pub fn url(current: &Route, options: &UrlOptions) -> String {
    let mut location = String::new();
    if let Some(module) = &options.module {
        push_segment(&mut location, module);
    }
    push_segment(
        &mut location,
        options.controller.as_deref().unwrap_or(&current.controller),
    );
    push_segment(
        &mut location,
        options.action.as_deref().unwrap_or(&current.action),
    );

    let mut params = param_pairs(&current.params);
    for (key, value) in &options.params {
        match params.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => existing.clone_from(value),
            None => params.push((key.clone(), value.clone())),
        }
    }
    for (key, value) in &params {
        push_segment(&mut location, key);
        push_segment(&mut location, value);
    }
    location
}

fn push_segment(location: &mut String, segment: &str) {
    location.push('/');
    location.push_str(&urlencoding::encode(segment));
}

/// Escape text for HTML, quotes included.
pub fn escape(text: &str) -> String {
    html_escape(text)
}

/// Two decimals with `,` as the thousands separator: `1234567.891` becomes
/// `1,234,567.89`.
pub fn money_format(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}

/// Number followed by its English ordinal suffix in `<sup>`.
pub fn ordinal_suffix(n: i64) -> String {
    format!("{n}<sup>{}</sup>", crate::time_utils::ordinal(n))
}
