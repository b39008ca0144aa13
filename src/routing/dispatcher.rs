// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Maps routes onto controllers and runs them.
//!
//! URL names are turned into controller and action names by convention:
//! `user-profile` is handled by `UserProfileController`, and `view-all` is
//! its `viewAll` action.

use crate::app::Application;
use crate::controller::{Context, Controller};
use crate::error::{FrameworkError, Result};
use crate::util::is_secure;

/// Nested dispatches (through `redispatch`) allowed per request.
pub const MAX_DISPATCH_DEPTH: usize = 16;

fn check_dashes(raw: &str) -> Result<()> {
    if raw.starts_with('-') || raw.ends_with('-') || !is_secure(raw) {
        return Err(FrameworkError::NotFound(
            "The requested controller does not exist".to_string(),
        ));
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `user-profile` becomes `UserProfileController`.
pub fn format_controller_name(raw: &str) -> Result<String> {
    check_dashes(raw)?;
    let mut name: String = raw.split('-').map(capitalize).collect();
    name.push_str("Controller");
    Ok(name)
}

/// `view-all` becomes `viewAll`; names without dashes are kept as they are.
pub fn format_action_name(raw: &str) -> Result<String> {
    check_dashes(raw)?;
    if !raw.contains('-') {
        return Ok(raw.to_string());
    }
    let mut words = raw.split('-');
    let mut name = words.next().unwrap_or_default().to_lowercase();
    name.extend(words.map(capitalize));
    Ok(name)
}

/// Dispatch the current route of `ctx`.
pub fn dispatch(app: &Application, ctx: &mut Context) -> Result<()> {
    if ctx.depth() >= MAX_DISPATCH_DEPTH {
        return Err(FrameworkError::Internal(anyhow::anyhow!(
            "Dispatch nested more than {MAX_DISPATCH_DEPTH} levels"
        )));
    }

    let route = ctx.router.route().clone();
    let controller_name = format_controller_name(&route.controller)?;
    let action = format_action_name(&route.action)?;

    let factory = app.controller(&route.module, &controller_name).ok_or_else(|| {
        FrameworkError::NotFound(format!(
            "Cannot access controller '{controller_name}' in module '{}'",
            route.module
        ))
    })?;
    let mut controller = factory();
    if !controller.actions().contains(&action.as_str()) {
        return Err(FrameworkError::NotFound(format!(
            "The action '{controller_name}::{action}()' does not exist"
        )));
    }

    tracing::debug!(
        module = %route.module,
        controller = %controller_name,
        action = %action,
        depth = ctx.depth(),
        "Dispatching"
    );

    // Each dispatch gets a fresh view; the caller's view comes back afterwards.
    let outer_view = std::mem::take(&mut ctx.view);
    ctx.enter();
    let result = run(controller.as_mut(), &action, &route, ctx);
    ctx.leave();
    ctx.view = outer_view;

    result.map_err(|e| {
        tracing::warn!(controller = %controller_name, action = %action, error = %e, "Dispatch failed");
        FrameworkError::dispatch(e)
    })
}

fn run(
    controller: &mut dyn Controller,
    action: &str,
    route: &crate::routing::router::Route,
    ctx: &mut Context,
) -> Result<()> {
    controller.init(ctx)?;
    controller.call(action, ctx)?;
    ctx.render(route)
}
