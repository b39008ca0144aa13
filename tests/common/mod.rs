// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{Request, Response};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use trellis::app::{Application, ApplicationBuilder};
use trellis::config::Config;
use trellis::controller::{Context, Controller};
use trellis::db::{BindType, DbModel, Model, Order, Paginator, SelectOptions, TableDef};
use trellis::error::{FrameworkError, Result};
use trellis::routes::create_router;
use trellis::services::RecordingNotifier;
use trellis::AppState;

pub const SESSION_SECRET: &[u8] = b"integration_test_session_secret!";

/// A test application and the temporary tree it serves.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: TempDir,
}

impl TestApp {
    #[allow(dead_code)]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Lay out an application tree with three modules:
/// - `pc`: development, own error controller and templates, a user table
/// - `mobi`: production with notifications, no error controller or views
/// - `broken`: no config file
pub fn write_tree(root: &Path) {
    write(
        root,
        "application/pc/configs/app.env",
        "ENVIRONMENT=development\nDATABASE_PATH=data/app.sqlite3\n",
    );
    write(
        root,
        "application/pc/layouts/layout.html",
        "<html><title>{{ title }}</title><body>{{{ content }}}</body></html>",
    );
    write(
        root,
        "application/pc/layouts/paginator.html",
        "<p>{{ first }}-{{ last }} of {{ count }}</p>{{#each pages}}[{{ number }}]{{/each}}{{#if next}}<a href=\"{{ base_url }}/page/{{ next }}\">next</a>{{/if}}",
    );
    write(
        root,
        "application/pc/views/index/index.html",
        "<h1>{{ title }}</h1>{{#if from}}<p>from {{ from }}</p>{{/if}}",
    );
    write(
        root,
        "application/pc/views/index/view-all.html",
        "<ul>{{#each items}}<li>{{ this }}</li>{{/each}}</ul>",
    );
    write(
        root,
        "application/pc/views/index/forward.html",
        "<p>forwarding</p>",
    );
    write(
        root,
        "application/pc/views/error/error404.html",
        "<h1>Missing</h1>{{#if exception}}<pre>{{ exception.message }}</pre>{{/if}}",
    );
    write(
        root,
        "application/pc/views/error/error500.html",
        "<h1>Broken</h1>{{#if exception}}<pre>{{ exception.message }}</pre>{{/if}}",
    );
    write(
        root,
        "application/pc/views/user/list.html",
        "<ul>{{#each records}}<li>{{ name }}</li>{{/each}}</ul>{{{ paginator }}}",
    );

    write(
        root,
        "application/mobi/configs/app.env",
        "ENVIRONMENT=production\nNOTIFY_ERRORS=on\nNOTIFY_TO=Mobile Support\n",
    );

    fs::create_dir_all(root.join("application/broken")).unwrap();

    let data = root.join("application/pc/data");
    fs::create_dir_all(&data).unwrap();
    let conn = rusqlite::Connection::open(data.join("app.sqlite3")).unwrap();
    conn.execute_batch(
        "CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO user (name) VALUES ('ada'), ('grace'), ('edsger'), ('barbara'), ('donald');",
    )
    .unwrap();
}

pub struct User;

impl Model for User {
    fn table() -> TableDef {
        TableDef::new("user")
            .column("id", BindType::Integer)
            .column("name", BindType::Text)
            .primary("id")
    }
}

pub struct IndexController;

impl Controller for IndexController {
    fn actions(&self) -> &'static [&'static str] {
        &[
            "index", "viewAll", "forward", "go", "fail", "gone", "counter", "headers",
            "partial", "report",
        ]
    }

    fn init(&mut self, ctx: &mut Context) -> Result<()> {
        ctx.view.set("title", "Home");
        Ok(())
    }

    fn call(&mut self, action: &str, ctx: &mut Context) -> Result<()> {
        match action {
            "index" => {
                if let Some(from) = ctx.router.param("from").and_then(|p| p.as_str()) {
                    let from = from.to_string();
                    ctx.view.set("from", from);
                }
            }
            "viewAll" => ctx.view.set("items", vec!["a", "<b>"]),
            "forward" => ctx.redispatch("index", "index", &[("from", "forward")], false)?,
            "go" => ctx.redirect("index", "index", "mobi", &[("a", "1")]),
            "fail" => {
                return Err(FrameworkError::Internal(anyhow::anyhow!("database exploded")))
            }
            "gone" => return Err(FrameworkError::NotFound("No such thing".to_string())),
            "counter" => {
                let count = {
                    let mut ns = ctx.session.namespace("counter")?;
                    let count = ns.get("n").ok().and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                    ns.set("n", count)?;
                    count
                };
                ctx.view.set_render(false);
                ctx.response.set_output(count.to_string());
            }
            "headers" => {
                ctx.view.set_render(false);
                ctx.send_headers_only = true;
                ctx.response.set_status(axum::http::StatusCode::ACCEPTED);
                ctx.response.set_output("dropped");
            }
            "partial" => {
                ctx.view.set_render(false);
                ctx.render_view_only = true;
                let script = ctx
                    .app()
                    .root()
                    .join("application/pc/views/index/index.html");
                ctx.view.set_script(script);
            }
            _ => {
                ctx.report_error("disk almost full")?;
                ctx.view.set_render(false);
                ctx.response.set_output("reported");
            }
        }
        Ok(())
    }
}

pub struct UserController;

impl Controller for UserController {
    fn actions(&self) -> &'static [&'static str] {
        &["list"]
    }

    fn call(&mut self, _action: &str, ctx: &mut Context) -> Result<()> {
        let config = ctx.config()?;
        let mut users: DbModel = User::open(&config);
        let rows = users.select(
            &SelectOptions::new()
                .column("id")
                .column("name")
                .order_by("id", Order::Asc),
            true,
        )?;
        let paginator = Paginator::new(rows, "users")?.per_page(2);
        ctx.paginate(&paginator)?;
        Ok(())
    }
}

pub struct ErrorController;

impl Controller for ErrorController {
    fn actions(&self) -> &'static [&'static str] {
        &["error404", "error500"]
    }

    fn call(&mut self, _action: &str, ctx: &mut Context) -> Result<()> {
        ctx.handle_exception()
    }
}

pub struct MobiIndexController;

impl Controller for MobiIndexController {
    fn actions(&self) -> &'static [&'static str] {
        &["index", "fail"]
    }

    fn call(&mut self, action: &str, ctx: &mut Context) -> Result<()> {
        if action == "fail" {
            return Err(FrameworkError::Cache("disk full".to_string()));
        }
        ctx.view.set_render(false);
        ctx.response.set_output("mobile home");
        Ok(())
    }
}

/// Create a test app over a fresh application tree.
pub fn create_test_app() -> TestApp {
    create_test_app_with(|builder| builder)
}

/// Create a test app, letting the caller adjust the application builder.
pub fn create_test_app_with(
    customize: impl FnOnce(ApplicationBuilder) -> ApplicationBuilder,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());

    let notifier = Arc::new(RecordingNotifier::new());
    let builder = Application::builder(dir.path())
        .session_secret(SESSION_SECRET)
        .notifier(notifier.clone())
        .controller("pc", "IndexController", || Box::new(IndexController))
        .controller("pc", "UserController", || Box::new(UserController))
        .controller("pc", "ErrorController", || Box::new(ErrorController))
        .controller("mobi", "IndexController", || Box::new(MobiIndexController))
        .controller("broken", "IndexController", || Box::new(MobiIndexController));
    let app = customize(builder).build().unwrap();

    let config = Config {
        root: dir.path().to_path_buf(),
        session_secret: SESSION_SECRET.to_vec(),
        ..Config::default()
    };
    let state = Arc::new(AppState { config, app });

    TestApp {
        router: create_router(state.clone()),
        state,
        notifier,
        dir,
    }
}

/// Build a GET request with optional extra headers.
#[allow(dead_code)]
pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header("host", "example.test");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

/// Collect a response body as text.
#[allow(dead_code)]
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
