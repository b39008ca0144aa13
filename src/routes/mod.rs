// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP routes: a health check, and the MVC pipeline for everything else.

use crate::error::FrameworkError;
use crate::http::Request;
use crate::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Hand a request to the application on a blocking worker.
async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    // `Form` reads the query string for GET and HEAD; only bodies count as post data.
    let post = if method == Method::GET || method == Method::HEAD {
        Vec::new()
    } else {
        match form {
            Ok(Form(pairs)) => pairs,
            Err(rejection) => {
                tracing::debug!(error = %rejection, "No form body");
                Vec::new()
            }
        }
    };

    let request = Request::new(method, uri, headers, post);
    let app = Arc::clone(&state.app);
    match tokio::task::spawn_blocking(move || app.handle(request)).await {
        Ok(response) => response,
        Err(e) => {
            FrameworkError::Internal(anyhow::anyhow!("Request worker failed: {e}")).into_response()
        }
    }
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(handle_request)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
