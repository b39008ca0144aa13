// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pagination of result sets.
//!
//! Route params `page` and `per-page` select the page. Page links are shown
//! in windows of ten.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use super::row::Row;
use crate::error::{FrameworkError, Result};
use crate::routing::router::find_param;
use crate::view::template::render_file;

pub const DEFAULT_PER_PAGE: usize = 10;
const WINDOW: usize = 10;

/// Splits a result set into pages.
#[derive(Debug, Clone)]
pub struct Paginator {
    results: Vec<Row>,
    item_label: String,
    per_page: usize,
    template: Option<PathBuf>,
}

/// One page of results and the numbers needed to link to the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub records: Vec<Row>,
    pub item_label: String,
    pub per_page: usize,
    pub offset: usize,
    pub count: usize,
    /// 1-based index of the first record shown
    pub first: usize,
    /// 1-based index of the last record shown
    pub last: usize,
    pub page_count: usize,
    pub current: usize,
    /// 0 when there is no previous page
    pub previous: usize,
    /// 0 when there is no next page
    pub next: usize,
    pub last_page: usize,
    pub page_start: usize,
    pub page_end: usize,
}

impl Paginator {
    pub fn new(results: Vec<Row>, item_label: impl Into<String>) -> Result<Self> {
        if results.is_empty() {
            return Err(FrameworkError::EmptyResults);
        }
        Ok(Self {
            results,
            item_label: item_label.into(),
            per_page: DEFAULT_PER_PAGE,
            template: None,
        })
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        if per_page > 0 {
            self.per_page = per_page;
        }
        self
    }

    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = Some(path.into());
        self
    }

    /// `<root>/application/<module>/layouts/paginator.html`
    pub fn default_template(root: &Path, module: &str) -> PathBuf {
        root.join("application")
            .join(module)
            .join("layouts")
            .join("paginator.html")
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    /// Compute the page selected by the route params.
    pub fn paginate(&self, params: &[String]) -> Page {
        let per_page = positive_param(params, "per-page").unwrap_or(self.per_page);
        let page = positive_param(params, "page").unwrap_or(1);
        let count = self.results.len();

        // Route params are untrusted; an offset that overflows is past the end.
        let offset = page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(per_page))
            .filter(|o| *o < count)
            .unwrap_or(0);
        let end = offset.saturating_add(per_page).min(count);
        let records: Vec<Row> = self.results[offset..end].to_vec();

        let first = offset + 1;
        let last = (first + records.len() - 1).min(count);
        let page_count = count.div_ceil(per_page);
        let current = offset / per_page + 1;
        let previous = if offset != 0 { current - 1 } else { 0 };
        let next = if offset.saturating_add(per_page) < count {
            current + 1
        } else {
            0
        };

        let index = current / WINDOW;
        let page_start = if index == 0 { 1 } else { index * WINDOW };
        let page_end = page_count.min((page_start + WINDOW) / WINDOW * WINDOW);

        Page {
            records,
            item_label: self.item_label.clone(),
            per_page,
            offset,
            count,
            first,
            last,
            page_count,
            current,
            previous,
            next,
            last_page: page_count,
            page_start,
            page_end,
        }
    }
}

impl Page {
    /// Template variables. `base_url` is the current URL without page params.
    pub fn to_json(&self, base_url: &str) -> serde_json::Value {
        let pages: Vec<serde_json::Value> = (self.page_start..=self.page_end)
            .map(|n| json!({"number": n, "is_current": n == self.current}))
            .collect();
        json!({
            "item_label": self.item_label,
            "base_url": base_url,
            "per_page": self.per_page,
            "count": self.count,
            "first": self.first,
            "last": self.last,
            "page_count": self.page_count,
            "current": self.current,
            "previous": self.previous,
            "next": self.next,
            "last_page": self.last_page,
            "page_start": self.page_start,
            "page_end": self.page_end,
            "pages": pages,
        })
    }

    /// Render the paginator template for this page.
    pub fn render_script(&self, template: &Path, base_url: &str) -> Result<String> {
        render_file(template, &self.to_json(base_url))
    }
}

fn positive_param(params: &[String], key: &str) -> Option<usize> {
    find_param(params, key)
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
}
