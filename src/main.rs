// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trellis demo server
//!
//! Serves the application tree under `TRELLIS_ROOT` with a small set of
//! demo controllers for the `pc` module.

use std::sync::Arc;

use serde_json::json;
use trellis::{
    app::Application,
    config::Config,
    controller::{Context, Controller},
    error::Result,
    validation::{Filter, FormValidator, Rule},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Landing page with a per-session visit counter.
struct IndexController;

impl Controller for IndexController {
    fn actions(&self) -> &'static [&'static str] {
        &["index", "contact", "thanks"]
    }

    fn init(&mut self, ctx: &mut Context) -> Result<()> {
        ctx.view.set("site_name", "Trellis");
        Ok(())
    }

    fn call(&mut self, action: &str, ctx: &mut Context) -> Result<()> {
        match action {
            "index" => {
                let visits = {
                    let mut stats = ctx.session.namespace("stats")?;
                    let visits = stats.get("visits").ok().and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                    stats.set("visits", visits)?;
                    visits
                };
                ctx.view.set("title", "Welcome");
                ctx.view.set("visits", visits);
            }
            "contact" => {
                let mut form = FormValidator::new()
                    .filter("email", Filter::Trim)
                    .filter("message", Filter::StripTags)
                    .rule("email", Rule::Required)
                    .rule("email", Rule::Email)
                    .rule("message", Rule::Length { min: Some(10), max: Some(2000) });
                if ctx.request.is_post() && form.is_valid(&ctx.request) {
                    tracing::info!(email = form.value("email").unwrap_or(""), "Contact form received");
                    ctx.redirect("thanks", "index", "", &[]);
                    return Ok(());
                }
                let errors: Vec<_> = form
                    .errors()
                    .unwrap_or_default()
                    .iter()
                    .map(|(field, message)| json!({"field": field, "message": message}))
                    .collect();
                ctx.view.set("title", "Contact");
                ctx.view.set("errors", errors);
            }
            _ => ctx.view.set("title", "Thank you"),
        }
        Ok(())
    }
}

/// Error pages rendered from the module's templates.
struct ErrorController;

impl Controller for ErrorController {
    fn actions(&self) -> &'static [&'static str] {
        &["error404", "error500"]
    }

    fn call(&mut self, _action: &str, ctx: &mut Context) -> Result<()> {
        ctx.handle_exception()
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, root = %config.root.display(), "Starting Trellis");

    let app = Application::builder(&config.root)
        .default_module(&config.default_module)
        .session_secret(config.session_secret.clone())
        .controller("pc", "IndexController", || Box::new(IndexController))
        .controller("pc", "ErrorController", || Box::new(ErrorController))
        .build()
        .expect("Failed to initialize application");

    // Sweep idle sessions even when no request saves one
    let sessions = app.sessions().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(trellis::session::DEFAULT_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            sessions.purge_expired();
        }
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        app,
    });

    // Build router
    let router = trellis::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, router).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trellis=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
