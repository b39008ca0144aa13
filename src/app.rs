// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The application: controller registry, module discovery and the
//! route → config → dispatch → render pipeline with error routing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use dashmap::DashMap;

use crate::config::{ConfigError, ModuleConfig};
use crate::controller::{Context, Controller, ControllerFactory, DefaultErrorController};
use crate::error::{FrameworkError, Result};
use crate::http::Request;
use crate::routing::dispatcher::dispatch;
use crate::routing::router::RouteSpec;
use crate::services::notifier::{Notifier, WebhookNotifier};
use crate::session::{SessionStore, DEFAULT_PURGE_INTERVAL};
use crate::util::{debug_html, is_secure};

/// Shown in production when even the error controller fails.
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "An unexpected application error occurred while processing your request. Please try again later.";

const ERROR_CONTROLLER: &str = "ErrorController";

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    root: PathBuf,
    default_module: String,
    session_secret: Vec<u8>,
    controllers: HashMap<(String, String), ControllerFactory>,
    notifier: Option<Arc<dyn Notifier>>,
    session_purge_interval: Duration,
}

impl ApplicationBuilder {
    pub fn default_module(mut self, module: impl Into<String>) -> Self {
        self.default_module = module.into();
        self
    }

    pub fn session_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.session_secret = secret.into();
        self
    }

    /// Register a controller of `module` under its full name, for example
    /// `UserProfileController`.
    pub fn controller<F>(mut self, module: &str, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.controllers
            .insert((module.to_string(), name.to_string()), Arc::new(factory));
        self
    }

    /// How often saving a session also sweeps expired sessions.
    pub fn session_purge_interval(mut self, interval: Duration) -> Self {
        self.session_purge_interval = interval;
        self
    }

    /// Use `notifier` for every module instead of the configured webhook.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Discover the modules and build the application.
    pub fn build(self) -> Result<Arc<Application>> {
        let modules = discover_modules(&self.root)?;
        tracing::info!(
            root = %self.root.display(),
            modules = ?modules,
            controllers = self.controllers.len(),
            "Application initialized"
        );
        Ok(Arc::new(Application {
            root: self.root,
            default_module: self.default_module,
            modules,
            controllers: self.controllers,
            configs: DashMap::new(),
            sessions: SessionStore::with_purge_interval(self.session_purge_interval),
            session_secret: Arc::from(self.session_secret),
            notifier: self.notifier,
            webhooks: DashMap::new(),
        }))
    }
}

/// Directories under `<root>/application`, sorted by name.
pub fn discover_modules(root: &Path) -> Result<Vec<String>> {
    let dir = root.join("application");
    let unreadable = |e: std::io::Error| ConfigError::ModulesDir {
        path: dir.clone(),
        reason: e.to_string(),
    };

    let mut modules = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if !entry.file_type().map_err(unreadable)?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            modules.push(name.to_string());
        }
    }
    modules.sort();
    Ok(modules)
}

/// Shared, immutable application state.
pub struct Application {
    root: PathBuf,
    default_module: String,
    modules: Vec<String>,
    controllers: HashMap<(String, String), ControllerFactory>,
    configs: DashMap<String, Arc<ModuleConfig>>,
    sessions: SessionStore,
    session_secret: Arc<[u8]>,
    notifier: Option<Arc<dyn Notifier>>,
    webhooks: DashMap<String, Arc<dyn Notifier>>,
}

impl Application {
    pub fn builder(root: impl Into<PathBuf>) -> ApplicationBuilder {
        ApplicationBuilder {
            root: root.into(),
            default_module: "pc".to_string(),
            session_secret: Vec::new(),
            controllers: HashMap::new(),
            notifier: None,
            session_purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_module(&self) -> &str {
        &self.default_module
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn session_secret(&self) -> Arc<[u8]> {
        Arc::clone(&self.session_secret)
    }

    /// Factory for a controller of a module. Modules without their own
    /// `ErrorController` get [`DefaultErrorController`].
    pub fn controller(&self, module: &str, name: &str) -> Option<ControllerFactory> {
        if let Some(factory) = self.controllers.get(&(module.to_string(), name.to_string())) {
            return Some(Arc::clone(factory));
        }
        if name != ERROR_CONTROLLER {
            return None;
        }
        let fallback: ControllerFactory =
            Arc::new(|| -> Box<dyn Controller> { Box::new(DefaultErrorController) });
        Some(fallback)
    }

    /// Parsed config of a module, cached after the first load.
    pub fn module_config(&self, module: &str) -> Result<Arc<ModuleConfig>> {
        if let Some(config) = self.configs.get(module) {
            return Ok(Arc::clone(config.value()));
        }
        if !is_secure(module) || !self.modules.iter().any(|m| m == module) {
            return Err(FrameworkError::InvalidModule(module.to_string()));
        }
        let config = Arc::new(ModuleConfig::load(&self.root, module)?);
        self.configs
            .insert(module.to_string(), Arc::clone(&config));
        Ok(config)
    }

    /// Notifier for a module: the one given to the builder, else a webhook
    /// notifier when the module configures a URL.
    pub fn notifier_for(&self, config: &ModuleConfig) -> Option<Arc<dyn Notifier>> {
        if let Some(notifier) = &self.notifier {
            return Some(Arc::clone(notifier));
        }
        let url = config.notify_webhook_url.as_ref()?;
        if let Some(existing) = self.webhooks.get(url) {
            return Some(Arc::clone(existing.value()));
        }
        match WebhookNotifier::new(url.clone()) {
            Ok(webhook) => {
                let webhook: Arc<dyn Notifier> = Arc::new(webhook);
                self.webhooks.insert(url.clone(), Arc::clone(&webhook));
                Some(webhook)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot create webhook notifier");
                None
            }
        }
    }

    /// Build the context for a request.
    pub fn context(self: &Arc<Self>, request: Request) -> Context {
        Context::new(Arc::clone(self), request)
    }

    /// Handle a request from start to finish.
    pub fn handle(self: &Arc<Self>, request: Request) -> axum::response::Response {
        let mut ctx = self.context(request);
        self.run(&mut ctx);
        ctx.finish()
    }

    /// Run the pipeline for `ctx`. Failures are routed to the module's
    /// `error/error404` or `error/error500` action.
    pub fn run(&self, ctx: &mut Context) {
        let Err(err) = self.prepare(ctx).and_then(|()| dispatch(self, ctx)) else {
            return;
        };

        let action = if err.is_not_found() { "error404" } else { "error500" };
        if err.is_not_found() {
            tracing::info!(error = %err, path = %ctx.request.path(), "Routing to not-found page");
        } else {
            tracing::error!(error = %err, chain = ?err.chain(), "Routing to error page");
        }

        ctx.response.clear_output();
        ctx.view.set_render(true);
        ctx.set_exception(err);
        ctx.router.set_route(RouteSpec::new("error", action));

        if let Err(fatal) = dispatch(self, ctx) {
            self.unhandled(ctx, fatal);
        }
    }

    fn prepare(&self, ctx: &mut Context) -> Result<()> {
        let config = ctx.config()?;
        if !ctx.session.is_started() {
            ctx.session.configure(&config.session)?;
        }
        Ok(())
    }

    /// Last resort when the error controller fails too.
    fn unhandled(&self, ctx: &mut Context, fatal: FrameworkError) {
        tracing::error!(error = %fatal, chain = ?fatal.chain(), "Error page failed");

        let development = self
            .module_config(ctx.router.current_module())
            .map(|c| c.is_development())
            .unwrap_or(false);

        let body = if development {
            let mut body = String::new();
            if let Some(original) = ctx.exception() {
                body.push_str(&debug_html("First", &serde_json::json!(original.chain())));
            }
            body.push_str(&debug_html("Next", &serde_json::json!(fatal.chain())));
            body
        } else {
            debug_html(
                "Unexpected Application Error",
                &serde_json::Value::String(UNEXPECTED_ERROR_MESSAGE.to_string()),
            )
        };

        ctx.response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.response.set_output(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_modules_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for module in ["pc", "admin", "mobi"] {
            fs::create_dir_all(dir.path().join("application").join(module)).unwrap();
        }
        fs::write(dir.path().join("application/README"), "not a module").unwrap();

        assert_eq!(
            discover_modules(dir.path()).unwrap(),
            vec!["admin".to_string(), "mobi".to_string(), "pc".to_string()]
        );
    }

    #[test]
    fn test_missing_application_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_modules(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::Config(ConfigError::ModulesDir { .. })
        ));
    }

    #[test]
    fn test_error_controller_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("application/pc")).unwrap();
        let app = Application::builder(dir.path()).build().unwrap();

        assert!(app.controller("pc", "ErrorController").is_some());
        assert!(app.controller("pc", "UserController").is_none());
    }

    #[test]
    fn test_module_config_rejects_unknown_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("application/pc")).unwrap();
        let app = Application::builder(dir.path()).build().unwrap();

        assert!(matches!(
            app.module_config("../etc"),
            Err(FrameworkError::InvalidModule(_))
        ));
        assert!(matches!(
            app.module_config("pc"),
            Err(FrameworkError::Config(ConfigError::Unreadable { .. }))
        ));
    }
}
