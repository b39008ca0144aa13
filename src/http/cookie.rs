// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cookie reads and writes for one request.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::request::Request;

/// Attributes of a cookie being set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// `None` makes a browser-session cookie.
    pub lifetime: Option<Duration>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            lifetime: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

/// Cookies of the request plus the changes to send back.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    jar: CookieJar,
}

impl Cookies {
    pub fn from_request(request: &Request) -> Self {
        Self {
            jar: request.cookies().clone(),
        }
    }

    /// Cookie value, falling back to a request parameter of the same name.
    pub fn get(&self, name: &str, request: &Request) -> Option<String> {
        self.jar
            .get(name)
            .map(|c| c.value().to_string())
            .or_else(|| request.get(name))
    }

    pub fn set(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let cookie = build_cookie(name, value, options);
        self.update(|jar| jar.add(cookie));
    }

    /// Expire a cookie on the client.
    pub fn expire(&mut self, name: &str, options: &CookieOptions) {
        let mut cookie = build_cookie(name, "", options);
        cookie.make_removal();
        self.update(|jar| jar.add(cookie));
    }

    fn update(&mut self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let jar = std::mem::take(&mut self.jar);
        self.jar = f(jar);
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

fn build_cookie(name: &str, value: &str, options: &CookieOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .same_site(SameSite::Lax);
    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(lifetime) = options.lifetime {
        builder = builder.max_age(time::Duration::seconds(lifetime.as_secs() as i64));
    }
    builder.build()
}
