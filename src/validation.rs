// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Form validation over request params.

use std::collections::HashMap;

use validator::{ValidateEmail, ValidateLength};

use crate::http::Request;

/// A check applied to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Length in characters.
    Length { min: Option<u64>, max: Option<u64> },
    Email,
}

/// A transformation applied to a field before the rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Trim,
    Lowercase,
    StripTags,
}

/// Validates the fields of a submitted form.
#[derive(Debug, Clone, Default)]
pub struct FormValidator {
    rules: Vec<(String, Rule)>,
    filters: Vec<(String, Filter)>,
    values: HashMap<String, String>,
    /// First failure of each field, in rule order
    errors: Vec<(String, String)>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    pub fn filter(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.filters.push((field.into(), filter));
        self
    }

    /// Filter and check every field named by a rule against `request`.
    pub fn is_valid(&mut self, request: &Request) -> bool {
        self.validate_with(|field| request.get(field))
    }

    /// Same as [`is_valid`](Self::is_valid) over any value source.
    pub fn validate_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        self.values.clear();
        self.errors.clear();

        let fields = self
            .rules
            .iter()
            .map(|(f, _)| f)
            .chain(self.filters.iter().map(|(f, _)| f));
        for field in fields {
            if self.values.contains_key(field) {
                continue;
            }
            let mut value = lookup(field).unwrap_or_default();
            for (_, filter) in self.filters.iter().filter(|(f, _)| f == field) {
                value = apply_filter(*filter, &value);
            }
            self.values.insert(field.clone(), value);
        }

        for (field, rule) in &self.rules {
            if self.errors.iter().any(|(f, _)| f == field) {
                continue;
            }
            let value = self.values.get(field).map(String::as_str).unwrap_or("");
            if let Some(message) = check(rule, field, value) {
                tracing::debug!(field = %field, "Form field failed validation");
                self.errors.push((field.clone(), message));
            }
        }
        self.errors.is_empty()
    }

    /// Filtered value of a field after validation.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Failures as (field, message) pairs; `None` when there are none.
    pub fn errors(&self) -> Option<&[(String, String)]> {
        (!self.errors.is_empty()).then_some(self.errors.as_slice())
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, message)| message.as_str())
    }
}

fn check(rule: &Rule, field: &str, value: &str) -> Option<String> {
    let label = field_label(field);
    match rule {
        Rule::Required if value.is_empty() => Some(format!("{label} is required")),
        Rule::Required => None,
        // Optional fields are only checked when filled in.
        _ if value.is_empty() => None,
        Rule::Length { min, max } => {
            if value.validate_length(*min, *max, None) {
                None
            } else {
                Some(match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("{label} must be between {min} and {max} characters")
                    }
                    (Some(min), None) => format!("{label} must be at least {min} characters"),
                    (None, Some(max)) => format!("{label} must be at most {max} characters"),
                    (None, None) => format!("{label} has an invalid length"),
                })
            }
        }
        Rule::Email if value.validate_email() => None,
        Rule::Email => Some(format!("{label} must be a valid email address")),
    }
}

fn apply_filter(filter: Filter, value: &str) -> String {
    match filter {
        Filter::Trim => value.trim().to_string(),
        Filter::Lowercase => value.to_lowercase(),
        Filter::StripTags => strip_tags(value),
    }
}

fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Human label for a field name: `first-name` becomes `First name`.
pub fn field_label(field: &str) -> String {
    let spaced = field.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
