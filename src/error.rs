// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Framework error types with consistent HTTP classification.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::session::SessionError;

/// Framework error type.
///
/// Every failure in the request pipeline is one of these. The application
/// routes `NotFound` failures to `error/error404` and everything else to
/// `error/error500`.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid module name '{0}' specified")]
    InvalidModule(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid column name '{0}' supplied")]
    InvalidColumn(String),

    #[error("The supplied column name or alias '{0}' does not exist")]
    UnknownColumn(String),

    #[error("Cannot bind value to column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Invalid '{clause}' clause supplied")]
    InvalidClause { clause: &'static str },

    #[error("No primary key defined for table '{0}'")]
    MissingPrimaryKey(String),

    #[error("Statement for table '{0}' has no values")]
    EmptyStatement(String),

    #[error("Invalid data provided to paginator")]
    EmptyResults,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("The key '{0}' doesn't exist in the server variables")]
    MissingServerKey(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The dispatch could not be completed")]
    Dispatch {
        #[source]
        source: Box<FrameworkError>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FrameworkError {
    /// Wrap a failure raised while running a controller.
    ///
    /// Explicit not-found errors keep their classification so a controller can
    /// still answer with a 404.
    pub fn dispatch(source: FrameworkError) -> Self {
        match source {
            err @ FrameworkError::NotFound(_) => err,
            err @ FrameworkError::Dispatch { .. } => err,
            other => FrameworkError::Dispatch {
                source: Box::new(other),
            },
        }
    }

    /// Whether this error should be answered with the 404 error page.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FrameworkError::NotFound(_))
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Messages of this error and every error it wraps, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            messages.push(err.to_string());
            current = err.source();
        }
        messages
    }
}

impl IntoResponse for FrameworkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, chain = ?self.chain(), "Unhandled framework error");
        }
        let body = if self.is_not_found() {
            "Not Found".to_string()
        } else {
            "Internal Server Error".to_string()
        };
        (status, body).into_response()
    }
}

/// Result type alias for the framework.
pub type Result<T> = std::result::Result<T, FrameworkError>;
