// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side sessions.
//!
//! Session data lives in a [`SessionStore`] shared by all requests. The client
//! only holds the session id, in a cookie whose value is `<id>.<signature>`
//! with an HMAC-SHA256 signature over the id. A missing, unknown or tampered
//! cookie starts a fresh session.
//!
//! Framework data is kept under a base key inside the session map, so
//! several applications can share one store without clashing.

pub mod cookie;
pub mod namespace;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::config::SessionSettings;
use crate::http::{Cookies, Request};
use crate::util::random_string;

pub use cookie::SessionCookieOptions;
pub use namespace::Namespace;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_KEY: &str = "__TRELLIS__";
const ID_LENGTH: usize = 32;

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A session has not been started")]
    NotStarted,

    #[error("A session has already been started. {0} must be called before start")]
    AlreadyStarted(&'static str),

    #[error("Writing to the current session has been disabled")]
    ReadOnly,

    #[error("Writing to the session namespace '{0}' has been disabled")]
    NamespaceReadOnly(String),

    #[error("The key '{0}' does not exist in the session")]
    MissingKey(String),

    #[error("Invalid session id '{0}'")]
    InvalidId(String),

    #[error("The key supplied '{0}' is invalid")]
    InvalidOption(String),

    #[error("Invalid session data: {0}")]
    InvalidData(String),

    #[error("Could not generate a session id: {0}")]
    IdGeneration(String),
}

/// How often `save` sweeps idle sessions out of the store.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct SessionRecord {
    data: Map<String, Value>,
    expires_at: Instant,
}

/// Session data of every client, keyed by session id.
///
/// Every record expires a fixed time after its last save. Expired records
/// are dropped when looked up, and swept from the whole store at most once
/// per purge interval while sessions are being saved.
#[derive(Debug, Clone)]
pub struct SessionStore {
    records: Arc<DashMap<String, SessionRecord>>,
    last_purge: Arc<Mutex<Instant>>,
    purge_interval: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_interval(purge_interval: Duration) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            last_purge: Arc::new(Mutex::new(Instant::now())),
            purge_interval,
        }
    }

    /// Data of a live session. Expired sessions are removed.
    pub fn load(&self, id: &str) -> Option<Map<String, Value>> {
        let expired = {
            let record = self.records.get(id)?;
            if record.expires_at > Instant::now() {
                return Some(record.data.clone());
            }
            true
        };
        if expired {
            self.records.remove(id);
        }
        None
    }

    /// Store session data, live for `ttl` from now.
    pub fn save(&self, id: &str, data: Map<String, Value>, ttl: Duration) {
        let now = Instant::now();
        self.records.insert(
            id.to_string(),
            SessionRecord {
                data,
                expires_at: now + ttl,
            },
        );
        self.maybe_purge(now);
    }

    pub fn remove(&self, id: &str) {
        self.records.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every expired session.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            tracing::debug!(purged, remaining = self.records.len(), "Purged expired sessions");
        }
    }

    fn maybe_purge(&self, now: Instant) {
        let due = {
            let mut last = self
                .last_purge
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if now.duration_since(*last) >= self.purge_interval {
                *last = now;
                true
            } else {
                false
            }
        };
        if due {
            self.purge_expired();
        }
    }
}

/// Cookie value for a session id.
pub fn sign_id(secret: &[u8], id: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(id.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{id}.{signature}"))
}

/// Session id from a cookie value, if the signature matches.
pub fn verify_id(secret: &[u8], value: &str) -> Option<String> {
    let (id, signature) = value.rsplit_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(id.to_string())
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ',')
        && !id.chars().all(|c| c.is_ascii_digit())
}

/// The session of one request.
#[derive(Debug)]
pub struct Session {
    store: SessionStore,
    secret: Arc<[u8]>,
    name: String,
    base_key: String,
    options: SessionCookieOptions,
    /// Idle time after which the stored data is dropped
    gc_max_lifetime: Duration,
    /// Cookies sent with the request
    request_cookies: HashMap<String, String>,
    /// Names of the query and form params sent with the request
    request_params: HashSet<String>,
    id: Option<String>,
    data: Map<String, Value>,
    started: bool,
    read_only: bool,
    destroyed: bool,
    cookie_pending: bool,
    retired_ids: Vec<String>,
}

impl Session {
    pub fn new(store: SessionStore, secret: Arc<[u8]>, request: &Request) -> Self {
        let request_cookies = request
            .cookies()
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let request_params = request
            .query_pairs()
            .iter()
            .chain(request.post_pairs())
            .map(|(k, _)| k.clone())
            .collect();
        let defaults = SessionSettings::default();
        Self {
            store,
            secret,
            name: defaults.name.clone(),
            base_key: DEFAULT_BASE_KEY.to_string(),
            options: SessionCookieOptions::from_settings(&defaults),
            gc_max_lifetime: defaults.gc_max_lifetime,
            request_cookies,
            request_params,
            id: None,
            data: Map::new(),
            started: false,
            read_only: false,
            destroyed: false,
            cookie_pending: false,
            retired_ids: Vec::new(),
        }
    }

    /// Apply module settings. Must happen before the session starts.
    pub fn configure(&mut self, settings: &SessionSettings) -> Result<(), SessionError> {
        self.ensure_not_started("configure")?;
        self.name = settings.name.clone();
        self.options = SessionCookieOptions::from_settings(settings);
        self.gc_max_lifetime = settings.gc_max_lifetime;
        Ok(())
    }

    /// Start the session. Starting an already started session does nothing.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Ok(());
        }

        let explicit = self.id.take();
        let requested = explicit.clone().or_else(|| {
            self.request_cookies
                .get(&self.name)
                .and_then(|value| verify_id(&self.secret, value))
        });

        match requested.and_then(|id| self.store.load(&id).map(|data| (id, data))) {
            Some((id, data)) => {
                tracing::debug!(session = %self.name, "Resumed session");
                self.id = Some(id);
                self.data = data;
            }
            None => {
                let id = match explicit {
                    Some(id) => id,
                    None => new_id()?,
                };
                tracing::debug!(session = %self.name, "Started new session");
                self.id = Some(id);
                self.data = Map::new();
                self.cookie_pending = true;
            }
        }
        self.started = true;
        self.destroyed = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn ensure_started(&self) -> Result<(), SessionError> {
        if self.started {
            Ok(())
        } else {
            Err(SessionError::NotStarted)
        }
    }

    fn ensure_not_started(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.started {
            Err(SessionError::AlreadyStarted(operation))
        } else {
            Ok(())
        }
    }

    fn ensure_writable(&self) -> Result<(), SessionError> {
        self.ensure_started()?;
        if self.read_only {
            return Err(SessionError::ReadOnly);
        }
        Ok(())
    }

    fn bucket(&self) -> Option<&Map<String, Value>> {
        self.data.get(&self.base_key).and_then(Value::as_object)
    }

    /// Run `f` on the map under the base key, creating it when missing.
    fn with_bucket<R>(&mut self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut bucket = match self.data.remove(&self.base_key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let out = f(&mut bucket);
        self.data
            .insert(self.base_key.clone(), Value::Object(bucket));
        out
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        self.ensure_writable()?;
        let value = value.into();
        self.with_bucket(|b| b.insert(key.to_string(), value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Value, SessionError> {
        self.ensure_started()?;
        self.bucket()
            .and_then(|b| b.get(key))
            .filter(|v| !v.is_null())
            .ok_or_else(|| SessionError::MissingKey(key.to_string()))
    }

    /// Whether `key` is set to a non-null value.
    pub fn key_exists(&self, key: &str) -> Result<bool, SessionError> {
        self.ensure_started()?;
        Ok(self
            .bucket()
            .and_then(|b| b.get(key))
            .is_some_and(|v| !v.is_null()))
    }

    pub fn unset_key(&mut self, key: &str) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.with_bucket(|b| b.remove(key));
        Ok(())
    }

    /// Remove all session data, including data outside the base key.
    pub fn unset_all(&mut self) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.data.clear();
        Ok(())
    }

    pub fn set_base_key(&mut self, key: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_started("set_base_key")?;
        self.base_key = key.into();
        Ok(())
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_started("set_name")?;
        self.name = name.into();
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Use a specific session id for the next start.
    pub fn set_id(&mut self, id: &str) -> Result<(), SessionError> {
        self.ensure_not_started("set_id")?;
        if !valid_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        self.id = Some(id.to_string());
        Ok(())
    }

    pub fn id(&self) -> Result<&str, SessionError> {
        self.ensure_started()?;
        self.id.as_deref().ok_or(SessionError::NotStarted)
    }

    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn unset_read_only(&mut self) {
        self.read_only = false;
    }

    pub fn is_writable(&self) -> bool {
        !self.read_only
    }

    /// Whether the client sent a session cookie or param.
    pub fn session_exists(&self) -> bool {
        self.request_cookies.contains_key(&self.name) || self.request_params.contains(&self.name)
    }

    /// Move the data to a fresh id; the old id stops working.
    pub fn regenerate_id(&mut self) -> Result<(), SessionError> {
        self.ensure_started()?;
        let new = new_id()?;
        if let Some(old) = self.id.replace(new) {
            self.retired_ids.push(old);
        }
        self.cookie_pending = true;
        Ok(())
    }

    /// Session data serialised as JSON.
    pub fn encode(&self) -> Result<String, SessionError> {
        self.ensure_started()?;
        serde_json::to_string(&self.data).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    /// Replace the session data with previously encoded data.
    pub fn decode(&mut self, encoded: &str) -> Result<(), SessionError> {
        self.ensure_started()?;
        match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => {
                self.data = map;
                Ok(())
            }
            Ok(_) => Err(SessionError::InvalidData(
                "encoded session is not an object".to_string(),
            )),
            Err(e) => Err(SessionError::InvalidData(e.to_string())),
        }
    }

    /// Cookie and store lifetime in seconds; 0 lasts for the browser session.
    pub fn expire_in(&mut self, secs: u64) -> Result<(), SessionError> {
        self.ensure_not_started("expire_in")?;
        self.options.set_lifetime(Some(Duration::from_secs(secs)));
        Ok(())
    }

    pub fn cookie_options(&self) -> &SessionCookieOptions {
        &self.options
    }

    pub fn cookie_option(&self, key: &str) -> Result<String, SessionError> {
        self.options.option(key)
    }

    pub fn set_cookie_option(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.ensure_not_started("set_cookie_option")?;
        self.options.set_option(key, value)
    }

    /// Save the data and end the session for this request.
    pub fn write_close(&mut self) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.save();
        self.started = false;
        Ok(())
    }

    /// Clear the data, forget the id and expire the cookie.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        self.ensure_started()?;
        self.data.clear();
        if let Some(id) = self.id.take() {
            self.store.remove(&id);
        }
        self.started = false;
        self.destroyed = true;
        self.cookie_pending = false;
        Ok(())
    }

    /// Open a namespace, creating it when missing.
    pub fn namespace(&mut self, name: &str) -> Result<Namespace<'_>, SessionError> {
        Namespace::open(self, name)
    }

    fn save(&mut self) {
        for old in self.retired_ids.drain(..) {
            self.store.remove(&old);
        }
        if let Some(id) = &self.id {
            // A persistent cookie keeps its data at least as long as it lives.
            let ttl = self
                .options
                .cookie_options()
                .lifetime
                .map_or(self.gc_max_lifetime, |l| l.max(self.gc_max_lifetime));
            self.store.save(id, self.data.clone(), ttl);
        }
    }

    /// Store the data and queue the cookie changes. Called once the request
    /// has been handled.
    pub fn persist(&mut self, cookies: &mut Cookies) {
        if self.destroyed {
            cookies.expire(&self.name, self.options.cookie_options());
            return;
        }
        if self.started {
            self.save();
            self.started = false;
        }
        if self.cookie_pending {
            if let Some(id) = &self.id {
                match sign_id(&self.secret, id) {
                    Ok(value) => cookies.set(&self.name, &value, self.options.cookie_options()),
                    Err(e) => tracing::error!(error = %e, "Failed to sign session cookie"),
                }
            }
            self.cookie_pending = false;
        }
    }
}

fn new_id() -> Result<String, SessionError> {
    random_string(ID_LENGTH, false, true).map_err(|e| SessionError::IdGeneration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue, Method};

    const SECRET: &[u8] = b"test_session_secret";

    fn session_with_cookie(store: &SessionStore, cookie: Option<&str>) -> Session {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        let request = Request::new(Method::GET, "/".parse().unwrap(), headers, Vec::new());
        Session::new(store.clone(), Arc::from(SECRET), &request)
    }

    fn issued_cookie(session: &mut Session) -> String {
        let mut cookies = Cookies::default();
        session.persist(&mut cookies);
        let response = axum::response::IntoResponse::into_response((
            cookies.into_jar(),
            axum::http::StatusCode::OK,
        ));
        let header = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        header.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_sign_and_verify() {
        let value = sign_id(SECRET, "abc123").unwrap();
        assert_eq!(verify_id(SECRET, &value).as_deref(), Some("abc123"));
        assert_eq!(verify_id(b"other", &value), None);
        assert_eq!(verify_id(SECRET, "abc123.bogus"), None);
        assert_eq!(verify_id(SECRET, "abc123"), None);
    }

    #[test]
    fn test_requires_start() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        assert!(matches!(s.set("a", 1), Err(SessionError::NotStarted)));
        assert!(matches!(s.get("a"), Err(SessionError::NotStarted)));
        assert!(matches!(s.id(), Err(SessionError::NotStarted)));

        s.start().unwrap();
        s.start().unwrap();
        assert!(matches!(
            s.set_name("other"),
            Err(SessionError::AlreadyStarted(_))
        ));
        assert!(matches!(s.expire_in(10), Err(SessionError::AlreadyStarted(_))));
    }

    #[test]
    fn test_data_survives_between_requests() {
        let store = SessionStore::new();
        let mut first = session_with_cookie(&store, None);
        first.start().unwrap();
        first.set("user", "ada").unwrap();
        let cookie = issued_cookie(&mut first);
        assert!(cookie.starts_with("TRELLISSESSID="));

        let mut second = session_with_cookie(&store, Some(&cookie));
        assert!(second.session_exists());
        second.start().unwrap();
        assert_eq!(*second.get("user").unwrap(), "ada");
    }

    #[test]
    fn test_tampered_cookie_starts_fresh() {
        let store = SessionStore::new();
        let mut first = session_with_cookie(&store, None);
        first.start().unwrap();
        first.set("user", "ada").unwrap();
        let cookie = issued_cookie(&mut first);

        let tampered = format!("{}x", cookie);
        let mut second = session_with_cookie(&store, Some(&tampered));
        second.start().unwrap();
        assert!(matches!(second.get("user"), Err(SessionError::MissingKey(_))));
    }

    #[test]
    fn test_read_only() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        s.start().unwrap();
        s.set_read_only();
        assert!(!s.is_writable());
        assert!(matches!(s.set("a", 1), Err(SessionError::ReadOnly)));
        s.unset_read_only();
        s.set("a", 1).unwrap();
    }

    #[test]
    fn test_keys() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        s.start().unwrap();
        s.set("a", 1).unwrap();
        s.set("n", Value::Null).unwrap();
        assert!(s.key_exists("a").unwrap());
        assert!(!s.key_exists("n").unwrap());
        s.unset_key("a").unwrap();
        assert!(!s.key_exists("a").unwrap());

        s.set("b", 2).unwrap();
        s.unset_all().unwrap();
        assert!(!s.key_exists("b").unwrap());
    }

    #[test]
    fn test_set_id_rules() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        assert!(matches!(s.set_id("12345"), Err(SessionError::InvalidId(_))));
        assert!(matches!(s.set_id("a b"), Err(SessionError::InvalidId(_))));
        s.set_id("custom1").unwrap();
        s.start().unwrap();
        assert_eq!(s.id().unwrap(), "custom1");
    }

    #[test]
    fn test_regenerate_retires_old_id() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        s.start().unwrap();
        s.set("k", "v").unwrap();
        s.write_close().unwrap();
        s.start().unwrap();
        let old = s.id().unwrap().to_string();
        assert!(store.contains(&old));

        s.regenerate_id().unwrap();
        let new = s.id().unwrap().to_string();
        assert_ne!(old, new);
        issued_cookie(&mut s);
        assert!(!store.contains(&old));
        assert_eq!(
            store.load(&new).unwrap()[DEFAULT_BASE_KEY]["k"],
            Value::from("v")
        );
    }

    #[test]
    fn test_encode_decode() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        s.start().unwrap();
        s.set("k", "v").unwrap();
        let encoded = s.encode().unwrap();
        s.unset_all().unwrap();
        s.decode(&encoded).unwrap();
        assert_eq!(*s.get("k").unwrap(), "v");
        assert!(s.decode("[1]").is_err());
    }

    #[test]
    fn test_destroy_expires_cookie() {
        let store = SessionStore::new();
        let mut s = session_with_cookie(&store, None);
        s.start().unwrap();
        let id = s.id().unwrap().to_string();
        s.write_close().unwrap();
        s.start().unwrap();
        s.destroy().unwrap();
        assert!(!store.contains(&id));

        let mut cookies = Cookies::default();
        s.persist(&mut cookies);
        let response = axum::response::IntoResponse::into_response((
            cookies.into_jar(),
            axum::http::StatusCode::OK,
        ));
        let header = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(header.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_store_expiry() {
        let store = SessionStore::new();
        store.save("a", Map::new(), Duration::ZERO);
        store.save("b", Map::new(), Duration::from_secs(3600));
        assert!(store.load("a").is_none());
        store.save("c", Map::new(), Duration::ZERO);
        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_idle_sessions_swept_on_save() {
        let store = SessionStore::with_purge_interval(Duration::ZERO);
        for id in ["a", "b", "c"] {
            store.save(id, Map::new(), Duration::ZERO);
        }
        // Never looked up again, yet gone once another session is saved.
        store.save("live", Map::new(), Duration::from_secs(3600));
        assert_eq!(store.len(), 1);
        assert!(store.contains("live"));
    }

    #[test]
    fn test_browser_session_cookie_still_gets_idle_expiry() {
        let store = SessionStore::new();
        let mut session = session_with_cookie(&store, None);
        session
            .configure(&SessionSettings {
                gc_max_lifetime: Duration::ZERO,
                ..SessionSettings::default()
            })
            .unwrap();
        assert_eq!(session.cookie_options().cookie_options().lifetime, None);
        session.start().unwrap();
        session.set("k", "v").unwrap();
        let id = session.id().unwrap().to_string();
        session.write_close().unwrap();

        assert!(!store.contains(&id));
        store.purge_expired();
        assert!(store.is_empty());
    }
}
