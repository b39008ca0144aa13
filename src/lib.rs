// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trellis: a small convention-based MVC web framework.
//!
//! Requests are routed by URL segments to a module, controller and action,
//! dispatched to a registered controller, and rendered through a view script
//! and module layout. Models talk to SQLite with an optional file cache for
//! query results.

pub mod app;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod routing;
pub mod services;
pub mod session;
pub mod time_utils;
pub mod util;
pub mod validation;
pub mod view;

use std::sync::Arc;

use app::Application;
use config::Config;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub app: Arc<Application>,
}
