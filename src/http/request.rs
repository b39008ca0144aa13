// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request wrapper with layered parameter lookup.

use std::collections::BTreeMap;

use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use axum_extra::extract::cookie::CookieJar;

use crate::error::{FrameworkError, Result};

/// An incoming request as seen by controllers.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    post: Vec<(String, String)>,
    server: BTreeMap<String, String>,
    cookies: CookieJar,
}

impl Request {
    /// Build a request. `post` holds the decoded form body, if any.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, post: Vec<(String, String)>) -> Self {
        let query = Query::<Vec<(String, String)>>::try_from_uri(&uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        let cookies = CookieJar::from_headers(&headers);
        let server = server_vars(&method, &uri, &headers);
        Self {
            method,
            uri,
            headers,
            query,
            post,
            server,
            cookies,
        }
    }

    /// A GET request for `uri`, mostly for tests.
    pub fn get_for(uri: &str) -> Self {
        Self::new(
            Method::GET,
            uri.parse().unwrap_or_else(|_| Uri::from_static("/")),
            HeaderMap::new(),
            Vec::new(),
        )
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Whether the request came from `XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// Whether the request came from a Flash player.
    pub fn is_flash(&self) -> bool {
        self.header("user-agent")
            .is_some_and(|ua| ua.to_ascii_lowercase().contains(" flash"))
    }

    /// Whether the request arrived over HTTPS, directly or via a proxy.
    pub fn is_secure(&self) -> bool {
        self.server.contains_key("HTTPS")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host").or_else(|| self.uri.host())
    }

    /// Look a key up in the query string, the form body, the server variables
    /// and the process environment, in that order.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_get(key)
            .or_else(|| self.get_post(key))
            .or_else(|| self.server.get(key).map(String::as_str))
            .map(str::to_string)
            .or_else(|| self.get_env(key))
    }

    pub fn get_get(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    pub fn get_post(&self, key: &str) -> Option<&str> {
        lookup(&self.post, key)
    }

    pub fn get_env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    pub fn get_server(&self, key: &str) -> Result<&str> {
        self.server
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| FrameworkError::MissingServerKey(key.to_string()))
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn post_pairs(&self) -> &[(String, String)] {
        &self.post
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|c| c.value().to_string())
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// CGI-style server variables.
fn server_vars(method: &Method, uri: &Uri, headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("REQUEST_METHOD".to_string(), method.to_string());
    vars.insert(
        "REQUEST_URI".to_string(),
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
    );
    vars.insert(
        "QUERY_STRING".to_string(),
        uri.query().unwrap_or_default().to_string(),
    );

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
            vars.entry(key).or_insert_with(|| value.to_string());
        }
    }

    let https = uri.scheme_str() == Some("https")
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"));
    if https {
        vars.insert("HTTPS".to_string(), "on".to_string());
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(method: Method, uri: &str, headers: &[(&'static str, &'static str)]) -> Request {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        Request::new(
            method,
            uri.parse().unwrap(),
            map,
            vec![("name".to_string(), "posted".to_string())],
        )
    }

    #[test]
    fn test_method_predicates() {
        let r = request(Method::POST, "/", &[]);
        assert!(r.is_post());
        assert!(!r.is_get() && !r.is_put() && !r.is_delete() && !r.is_head());
    }

    #[test]
    fn test_xhr_and_flash() {
        let r = request(
            Method::GET,
            "/",
            &[
                ("x-requested-with", "XMLHttpRequest"),
                ("user-agent", "Shockwave Flash"),
            ],
        );
        assert!(r.is_xhr());
        assert!(r.is_flash());
        assert!(!request(Method::GET, "/", &[]).is_xhr());
    }

    #[test]
    fn test_get_cascade() {
        let r = request(Method::POST, "/user/save?name=query&page=2", &[("host", "example.com")]);
        assert_eq!(r.get("name").as_deref(), Some("query"));
        assert_eq!(r.get_post("name"), Some("posted"));
        assert_eq!(r.get("page").as_deref(), Some("2"));
        assert_eq!(r.get("HTTP_HOST").as_deref(), Some("example.com"));
        assert_eq!(r.get("no_such_key_anywhere_x9"), None);
    }

    #[test]
    fn test_server_vars() {
        let r = request(
            Method::GET,
            "/a/b?x=1",
            &[("x-forwarded-proto", "https"), ("accept-language", "en")],
        );
        assert_eq!(r.get_server("REQUEST_METHOD").unwrap(), "GET");
        assert_eq!(r.get_server("REQUEST_URI").unwrap(), "/a/b?x=1");
        assert_eq!(r.get_server("QUERY_STRING").unwrap(), "x=1");
        assert_eq!(r.get_server("HTTP_ACCEPT_LANGUAGE").unwrap(), "en");
        assert!(r.is_secure());
        assert!(matches!(
            r.get_server("SERVER_NAME"),
            Err(FrameworkError::MissingServerKey(_))
        ));
    }

    #[test]
    fn test_cookies() {
        let r = request(Method::GET, "/", &[("cookie", "theme=dark; lang=en")]);
        assert_eq!(r.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(r.cookie("missing"), None);
    }
}
