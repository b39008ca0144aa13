// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Controllers and the per-request context they operate on.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use crate::app::Application;
use crate::config::ModuleConfig;
use crate::db::{Page, Paginator};
use crate::error::{FrameworkError, Result};
use crate::http::{Cookies, Request, Response};
use crate::routing::dispatcher::dispatch;
use crate::routing::router::{remove_param, ParamValue, Route, RouteSpec, Router};
use crate::services::error_log;
use crate::session::Session;
use crate::util::debug_html;
use crate::view::helpers::{url, UrlOptions};
use crate::view::template::is_truthy;
use crate::view::View;

/// A request handler answering to a fixed set of actions.
pub trait Controller: Send {
    /// Action names, as produced by
    /// [`format_action_name`](crate::routing::format_action_name).
    fn actions(&self) -> &'static [&'static str];

    /// Runs before the action.
    fn init(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn call(&mut self, action: &str, ctx: &mut Context) -> Result<()>;
}

/// Creates a controller for each dispatch.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Everything a controller sees of the current request.
pub struct Context {
    app: Arc<Application>,
    pub request: Request,
    pub response: Response,
    pub router: Router,
    pub view: View,
    pub session: Session,
    pub cookies: Cookies,
    config: Option<Arc<ModuleConfig>>,
    exception: Option<FrameworkError>,
    /// With rendering disabled, still send the view without the layout.
    pub render_view_only: bool,
    /// With rendering disabled, send no body at all.
    pub send_headers_only: bool,
    depth: usize,
}

impl Context {
    pub fn new(app: Arc<Application>, request: Request) -> Self {
        let router = Router::new(
            request.path(),
            app.modules().to_vec(),
            app.default_module(),
        );
        let session = Session::new(app.sessions().clone(), app.session_secret(), &request);
        let cookies = Cookies::from_request(&request);
        Self {
            app,
            request,
            response: Response::new(),
            router,
            view: View::new(),
            session,
            cookies,
            config: None,
            exception: None,
            render_view_only: false,
            send_headers_only: false,
            depth: 0,
        }
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// Config of the current module, loaded on first use.
    pub fn config(&mut self) -> Result<Arc<ModuleConfig>> {
        let module = self.router.route().module.clone();
        if let Some(config) = self.config.as_ref().filter(|c| c.module == module) {
            return Ok(Arc::clone(config));
        }
        let config = self.app.module_config(&module)?;
        self.config = Some(Arc::clone(&config));
        Ok(config)
    }

    /// The failure being handled by the error controller, if any.
    pub fn exception(&self) -> Option<&FrameworkError> {
        self.exception.as_ref()
    }

    pub fn set_exception(&mut self, exception: FrameworkError) {
        self.exception = Some(exception);
    }

    pub fn take_exception(&mut self) -> Option<FrameworkError> {
        self.exception.take()
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Cookie from the request, falling back to a request param.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name, &self.request)
    }

    /// Whether only the view (no layout) should be sent back.
    fn is_xhr(&mut self) -> bool {
        let route_flag = match self.router.param("xhr") {
            Some(ParamValue::Value(v)) => is_truthy(&serde_json::Value::String(v.to_string())),
            Some(ParamValue::Flag) => true,
            None => false,
        };
        self.request.is_xhr()
            || route_flag
            || self
                .request
                .get("xhr")
                .is_some_and(|v| is_truthy(&serde_json::Value::String(v)))
    }

    /// Render the view of `route` into the response.
    ///
    /// Output is appended, so a view rendered by a nested dispatch comes
    /// before the view of its caller.
    pub fn render(&mut self, route: &Route) -> Result<()> {
        let root = self.app.root().to_path_buf();
        if self.view.is_rendering() {
            let content = self.view.render_script(&root, route)?;
            if self.is_xhr() {
                self.response.append_output(&content);
                self.response.set_status(StatusCode::OK);
                return Ok(());
            }
            let page = self.view.render_layout(&root, &route.module, content)?;
            self.response.append_output(&page);
        } else if self.render_view_only {
            let content = self.view.render_script(&root, route)?;
            self.response.append_output(&content);
        } else if self.send_headers_only {
            self.response.clear_output();
        }
        Ok(())
    }

    /// Dispatch another action within the current module, reusing this
    /// request. Non-empty `params` replace the route params.
    ///
    /// The current view is not rendered unless `render_current` is set.
    pub fn redispatch(
        &mut self,
        action: &str,
        controller: &str,
        params: &[(&str, &str)],
        render_current: bool,
    ) -> Result<()> {
        let mut spec = RouteSpec::new(controller, action);
        if !params.is_empty() {
            spec = spec.with_params(
                params
                    .iter()
                    .flat_map(|(k, v)| [k.to_string(), v.to_string()])
                    .collect(),
            );
        }
        self.router.set_route(spec);
        let app = Arc::clone(&self.app);
        dispatch(&app, self)?;
        self.view.set_render(render_current);
        Ok(())
    }

    /// Answer with a 302 to `/{module}/{controller}/{action}/{k}/{v}...` on
    /// the current host. An empty module is left out.
    pub fn redirect(
        &mut self,
        action: &str,
        controller: &str,
        module: &str,
        params: &[(&str, &str)],
    ) {
        let mut location = String::new();
        let segments = [module, controller, action]
            .into_iter()
            .filter(|s| !s.is_empty())
            .chain(params.iter().flat_map(|(k, v)| [*k, *v]));
        for segment in segments {
            location.push('/');
            location.push_str(&urlencoding::encode(segment));
        }

        let scheme = if self.request.is_secure() { "https" } else { "http" };
        let host = self.request.host().unwrap_or("localhost").to_string();
        let location = format!("{scheme}://{host}{location}");
        tracing::debug!(location = %location, "Redirecting");

        self.response.set_header("Location", location);
        self.response.set_status(StatusCode::FOUND);
        self.view.set_render(false);
    }

    /// URL for another action, defaulting to the current route.
    pub fn url(&mut self, options: &UrlOptions) -> String {
        url(self.router.route(), options)
    }

    /// Apply the stored exception to the response.
    ///
    /// Sets a 404 or 500 status. In development the error chain is handed to
    /// the view as `exception`; in production anything other than a 404 is
    /// logged and reported to support.
    pub fn handle_exception(&mut self) -> Result<()> {
        let Some((not_found, chain)) = self
            .exception
            .as_ref()
            .map(|e| (e.is_not_found(), e.chain()))
        else {
            return Ok(());
        };

        let status = if not_found {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        self.response.set_status(status);

        let config = self.config()?;
        if config.is_development() {
            self.view.set(
                "exception",
                json!({
                    "status": status.as_u16(),
                    "message": chain.first(),
                    "chain": chain,
                    "debug": debug_html("Exception", &json!(chain)),
                }),
            );
        } else if !not_found {
            let notifier = self.app.notifier_for(&config);
            error_log::report_exception(&config, notifier.as_deref(), &chain);
        }
        Ok(())
    }

    /// Log an error noticed by application code and notify support when due.
    pub fn report_error(&mut self, message: &str) -> Result<()> {
        let config = self.config()?;
        let notifier = self.app.notifier_for(&config);
        error_log::report_error(&config, notifier.as_deref(), message);
        Ok(())
    }

    /// Paginate `paginator` with the route params and expose the result to
    /// the view as `records` and the rendered `paginator` markup.
    pub fn paginate(&mut self, paginator: &Paginator) -> Result<Page> {
        let route = self.router.route().clone();
        let page = paginator.paginate(&route.params);

        let mut base = route.clone();
        remove_param(&mut base.params, "page");
        remove_param(&mut base.params, "per-page");
        let base_url = url(&base, &UrlOptions::new());

        let template = paginator
            .template_path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| Paginator::default_template(self.app.root(), &route.module));
        let markup = page.render_script(&template, &base_url)?;

        let records: Vec<serde_json::Value> = page.records.iter().map(|r| r.to_json()).collect();
        self.view.set("records", records);
        self.view.set("paginator", markup);
        Ok(page)
    }

    /// Store the session and turn the context into an HTTP response.
    pub fn finish(mut self) -> axum::response::Response {
        self.session.persist(&mut self.cookies);
        self.response.into_http(self.cookies.into_jar())
    }
}

/// Error controller used by modules that do not register their own.
///
/// Renders a minimal page without templates.
#[derive(Debug, Default)]
pub struct DefaultErrorController;

impl Controller for DefaultErrorController {
    fn actions(&self) -> &'static [&'static str] {
        &["error404", "error500"]
    }

    fn call(&mut self, action: &str, ctx: &mut Context) -> Result<()> {
        ctx.handle_exception()?;
        let heading = match action {
            "error404" => "Page Not Found",
            _ => "Application Error",
        };
        let mut body = format!("<h1>{heading}</h1>");
        if let Some(exception) = ctx.view.get("exception").get("debug").and_then(|d| d.as_str()) {
            body.push_str(exception);
        }
        ctx.view.set_render(false);
        ctx.response.set_output(body);
        Ok(())
    }
}
