// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! URL segmentation into module / controller / action / params.
//!
//! The request path is split into segments which are consumed front to back:
//! an optional module name, then the controller, then the action. Whatever is
//! left over becomes the flat params list (`/key/value/key/value`).

use std::collections::{BTreeSet, HashMap};

use crate::error::{FrameworkError, Result};

pub const DEFAULT_CONTROLLER: &str = "index";
pub const DEFAULT_ACTION: &str = "index";

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub module: String,
    pub controller: String,
    pub action: String,
    pub params: Vec<String>,
}

/// A programmatic route change within the current module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub controller: String,
    pub action: String,
    /// Replacement params; `None` keeps the params of the current route.
    pub params: Option<Vec<String>>,
}

impl RouteSpec {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = Some(params);
        self
    }
}

/// Value of a single param lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue<'a> {
    /// The key was followed by a value segment.
    Value(&'a str),
    /// The key was the last segment.
    Flag,
}

impl<'a> ParamValue<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            ParamValue::Value(v) => Some(v),
            ParamValue::Flag => None,
        }
    }
}

/// Per-request router.
#[derive(Debug, Clone)]
pub struct Router {
    modules: Vec<String>,
    default_module: String,
    /// Segments not consumed yet while resolving from the path.
    pending: Vec<String>,
    current_module: String,
    route: Option<Route>,
}

impl Router {
    /// Create a router for a request path.
    pub fn new(path: &str, modules: Vec<String>, default_module: impl Into<String>) -> Self {
        let default_module = default_module.into();
        Self {
            modules,
            pending: split_path(path),
            current_module: default_module.clone(),
            default_module,
            route: None,
        }
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn current_module(&self) -> &str {
        &self.current_module
    }

    fn is_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    /// Take the next pending segment, or the default when none is left.
    fn shift_or(&mut self, default: &str) -> String {
        if self.pending.is_empty() {
            default.to_string()
        } else {
            self.pending.remove(0)
        }
    }

    /// Resolve the route from the request path.
    pub fn resolve(&mut self) -> &Route {
        let route = self.build_route();
        self.route.insert(route)
    }

    fn build_route(&mut self) -> Route {
        let starts_with_module = self
            .pending
            .first()
            .map(|first| self.is_module(first))
            .unwrap_or(false);
        let module = if starts_with_module {
            self.pending.remove(0)
        } else {
            self.default_module.clone()
        };
        let controller = self.shift_or(DEFAULT_CONTROLLER);
        let action = self.shift_or(DEFAULT_ACTION);
        let params = std::mem::take(&mut self.pending);

        tracing::debug!(
            module = %module,
            controller = %controller,
            action = %action,
            params = ?params,
            "Resolved route"
        );

        self.current_module = module.clone();
        Route {
            module,
            controller,
            action,
            params,
        }
    }

    /// Re-route within the current module.
    pub fn set_route(&mut self, spec: RouteSpec) -> &Route {
        let previous_params = self.route().params.clone();
        let module = self.current_module.clone();
        let params = spec.params.unwrap_or(previous_params);
        self.route.insert(Route {
            module,
            controller: spec.controller,
            action: spec.action,
            params,
        })
    }

    /// Switch the module of the resolved route.
    pub fn set_module(&mut self, module: &str) -> Result<()> {
        if !self.is_module(module) {
            return Err(FrameworkError::InvalidModule(module.to_string()));
        }
        self.route();
        self.current_module = module.to_string();
        if let Some(route) = self.route.as_mut() {
            route.module = module.to_string();
        }
        Ok(())
    }

    /// The route, resolving it on first access.
    pub fn route(&mut self) -> &Route {
        let route = match self.route.take() {
            Some(route) => route,
            None => self.build_route(),
        };
        self.route.insert(route)
    }

    /// The resolved route, if any. Does not trigger resolution.
    pub fn resolved(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn params(&mut self) -> &[String] {
        &self.route().params
    }

    /// Look up the segment following the first segment equal to `key`.
    pub fn param(&mut self, key: &str) -> Option<ParamValue<'_>> {
        find_param(&self.route().params, key)
    }

    /// Params as a map, pairing even positions with the following segment.
    pub fn param_map(&mut self) -> HashMap<String, String> {
        param_pairs(&self.route().params).into_iter().collect()
    }

    pub fn clear_params(&mut self) {
        self.route();
        if let Some(route) = self.route.as_mut() {
            route.params.clear();
        }
    }

    /// Remove every occurrence of `key` and the segment following it.
    pub fn clear_param(&mut self, key: &str) {
        self.route();
        if let Some(route) = self.route.as_mut() {
            remove_param(&mut route.params, key);
        }
    }
}

/// Remove every occurrence of `key` and the segment following it.
pub fn remove_param(params: &mut Vec<String>, key: &str) {
    let mut doomed = BTreeSet::new();
    for (i, p) in params.iter().enumerate() {
        if p == key {
            doomed.insert(i);
            doomed.insert(i + 1);
        }
    }
    let mut index = 0;
    params.retain(|_| {
        let keep = !doomed.contains(&index);
        index += 1;
        keep
    });
}

/// Split a request path into decoded segments.
pub fn split_path(path: &str) -> Vec<String> {
    let stripped = strip_request_path(path);
    if stripped.is_empty() {
        return Vec::new();
    }
    stripped
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect()
}

/// Collapse repeated slashes and strip the leading and trailing slash.
pub fn strip_request_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let mut collapsed = String::with_capacity(path.len());
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_slash {
                collapsed.push(c);
            }
            last_slash = true;
        } else {
            collapsed.push(c);
            last_slash = false;
        }
    }
    let trimmed = collapsed.strip_prefix('/').unwrap_or(&collapsed);
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Find the value following the first segment equal to `key`.
pub fn find_param<'a>(params: &'a [String], key: &str) -> Option<ParamValue<'a>> {
    let pos = params.iter().position(|p| p == key)?;
    Some(match params.get(pos + 1) {
        Some(value) => ParamValue::Value(value),
        None => ParamValue::Flag,
    })
}

/// Pair even positions with the following segment, keeping the first
/// occurrence of each key. Order of first appearance is preserved.
pub fn param_pairs(params: &[String]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (i, key) in params.iter().enumerate().step_by(2) {
        if pairs.iter().any(|(k, _)| k == key) {
            continue;
        }
        let value = params.get(i + 1).cloned().unwrap_or_default();
        pairs.push((key.clone(), value));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(path: &str) -> Router {
        Router::new(path, vec!["mobi".to_string(), "pc".to_string()], "pc")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_request_path() {
        assert_eq!(strip_request_path("//user///view/"), "user/view");
        assert_eq!(strip_request_path("/"), "");
        assert_eq!(strip_request_path(""), "");
        assert_eq!(strip_request_path("/a/b?x=1"), "a/b");
    }

    #[test]
    fn test_empty_path_uses_defaults() {
        let mut r = router("/");
        let route = r.route().clone();
        assert_eq!(route.module, "pc");
        assert_eq!(route.controller, "index");
        assert_eq!(route.action, "index");
        assert!(route.params.is_empty());
    }

    #[test]
    fn test_module_prefix() {
        let mut r = router("/mobi/user/view/id/7");
        let route = r.route().clone();
        assert_eq!(route.module, "mobi");
        assert_eq!(route.controller, "user");
        assert_eq!(route.action, "view");
        assert_eq!(route.params, strings(&["id", "7"]));
        assert_eq!(r.current_module(), "mobi");
    }

    #[test]
    fn test_controller_without_module() {
        let mut r = router("/user");
        let route = r.route().clone();
        assert_eq!(route.module, "pc");
        assert_eq!(route.controller, "user");
        assert_eq!(route.action, "index");
    }

    #[test]
    fn test_module_only() {
        let mut r = router("/mobi/");
        let route = r.route().clone();
        assert_eq!(route.module, "mobi");
        assert_eq!(route.controller, "index");
        assert_eq!(route.action, "index");
    }

    #[test]
    fn test_segments_are_decoded() {
        let mut r = router("/search/find/q/hello%20world");
        assert_eq!(r.param("q"), Some(ParamValue::Value("hello world")));
    }

    #[test]
    fn test_param_lookup() {
        let mut r = router("/user/list/page/2/sort/name/xhr");
        assert_eq!(r.param("page"), Some(ParamValue::Value("2")));
        assert_eq!(r.param("xhr"), Some(ParamValue::Flag));
        assert_eq!(r.param("missing"), None);
        // Any position matches, not only keys.
        assert_eq!(r.param("2"), Some(ParamValue::Value("sort")));
    }

    #[test]
    fn test_param_map_first_occurrence_wins() {
        let mut r = router("/user/list/page/2/page/5/tail");
        let map = r.param_map();
        assert_eq!(map.get("page").map(String::as_str), Some("2"));
        assert_eq!(map.get("tail").map(String::as_str), Some(""));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_set_route_keeps_module_and_params() {
        let mut r = router("/mobi/user/view/id/7");
        r.route();
        let route = r.set_route(RouteSpec::new("error", "error404")).clone();
        assert_eq!(route.module, "mobi");
        assert_eq!(route.controller, "error");
        assert_eq!(route.params, strings(&["id", "7"]));

        let route = r
            .set_route(RouteSpec::new("user", "edit").with_params(strings(&["id", "9"])))
            .clone();
        assert_eq!(route.params, strings(&["id", "9"]));
    }

    #[test]
    fn test_set_module_validates() {
        let mut r = router("/user/view");
        assert!(matches!(
            r.set_module("admin"),
            Err(FrameworkError::InvalidModule(_))
        ));
        r.set_module("mobi").unwrap();
        assert_eq!(r.route().module, "mobi");
    }

    #[test]
    fn test_clear_param_removes_key_and_value() {
        let mut r = router("/user/list/page/2/sort/name/page/3");
        r.clear_param("page");
        assert_eq!(r.params(), strings(&["sort", "name"]).as_slice());

        r.clear_params();
        assert!(r.params().is_empty());
    }
}
