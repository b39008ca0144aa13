// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Views: template variables, render flags and script/layout lookup.

pub mod helpers;
pub mod template;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::routing::router::Route;

pub use helpers::UrlOptions;
pub use template::{render_file, Template};

static NULL: Value = Value::Null;

/// Variables and render state of the current view.
#[derive(Debug, Clone)]
pub struct View {
    data: Map<String, Value>,
    render: bool,
    render_left_pane: bool,
    render_right_pane: bool,
    script: Option<PathBuf>,
    layout: Option<PathBuf>,
}

impl Default for View {
    fn default() -> Self {
        Self {
            data: Map::new(),
            render: true,
            render_left_pane: true,
            render_right_pane: true,
            script: None,
            layout: None,
        }
    }
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Value of a variable; `Null` when unset.
    pub fn get(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&NULL)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn all(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_rendering(&self) -> bool {
        self.render
    }

    pub fn set_render(&mut self, render: bool) {
        self.render = render;
    }

    pub fn set_render_left_pane(&mut self, render: bool) {
        self.render_left_pane = render;
    }

    pub fn set_render_right_pane(&mut self, render: bool) {
        self.render_right_pane = render;
    }

    /// Use another file instead of the script derived from the route.
    pub fn set_script(&mut self, path: impl Into<PathBuf>) {
        self.script = Some(path.into());
    }

    /// Use another file instead of the module layout.
    pub fn set_layout(&mut self, path: impl Into<PathBuf>) {
        self.layout = Some(path.into());
    }

    /// `<root>/application/<module>/views/<controller>/<action>.html`
    pub fn script_path(root: &Path, route: &Route) -> PathBuf {
        root.join("application")
            .join(&route.module)
            .join("views")
            .join(&route.controller)
            .join(format!("{}.html", route.action))
    }

    /// `<root>/application/<module>/layouts/layout.html`
    pub fn layout_path(root: &Path, module: &str) -> PathBuf {
        root.join("application")
            .join(module)
            .join("layouts")
            .join("layout.html")
    }

    /// Variables handed to templates: the view data plus the pane flags.
    fn template_data(&self) -> Map<String, Value> {
        let mut data = self.data.clone();
        data.insert("render_left_pane".into(), self.render_left_pane.into());
        data.insert("render_right_pane".into(), self.render_right_pane.into());
        data
    }

    /// Render the view script for `route`.
    pub fn render_script(&self, root: &Path, route: &Route) -> Result<String> {
        let path = self
            .script
            .clone()
            .unwrap_or_else(|| Self::script_path(root, route));
        tracing::debug!(script = %path.display(), "Rendering view script");
        render_file(&path, &Value::Object(self.template_data()))
    }

    /// Render the layout around already rendered view `content`.
    pub fn render_layout(&self, root: &Path, module: &str, content: String) -> Result<String> {
        let path = self
            .layout
            .clone()
            .unwrap_or_else(|| Self::layout_path(root, module));
        let mut data = self.template_data();
        data.insert("content".into(), Value::String(content));
        render_file(&path, &Value::Object(data))
    }
}
