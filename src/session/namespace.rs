// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Named sub-maps inside the session.

use serde_json::{Map, Value};

use super::{Session, SessionError};

/// A named map inside the session, so unrelated parts of an application
/// cannot overwrite each other's keys.
#[derive(Debug)]
pub struct Namespace<'a> {
    session: &'a mut Session,
    name: String,
    read_only: bool,
}

impl<'a> Namespace<'a> {
    /// Start the session if needed and create the namespace when missing.
    pub(super) fn open(session: &'a mut Session, name: &str) -> Result<Self, SessionError> {
        session.start()?;
        if !session.key_exists(name)? {
            session.set(name, Value::Object(Map::new()))?;
        }
        Ok(Self {
            session,
            name: name.to_string(),
            read_only: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn map(&self) -> Option<&Map<String, Value>> {
        self.session
            .get(&self.name)
            .ok()
            .and_then(Value::as_object)
    }

    /// Run `f` on the namespace map and write it back.
    fn update<R>(&mut self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> Result<R, SessionError> {
        let mut map = self.map().cloned().unwrap_or_default();
        let out = f(&mut map);
        self.session.set(&self.name, Value::Object(map))?;
        Ok(out)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        if !self.session.is_writable() {
            return Err(SessionError::ReadOnly);
        }
        if self.read_only {
            return Err(SessionError::NamespaceReadOnly(self.name.clone()));
        }
        let value = value.into();
        self.update(|map| map.insert(key.to_string(), value))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Value, SessionError> {
        self.map()
            .and_then(|map| map.get(key))
            .filter(|v| !v.is_null())
            .ok_or_else(|| SessionError::MissingKey(format!("{}.{key}", self.name)))
    }

    pub fn isset(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    pub fn unset(&mut self, key: &str) -> Result<(), SessionError> {
        if self.isset(key) {
            self.update(|map| map.remove(key))?;
        }
        Ok(())
    }

    /// Remove the namespace from the session.
    pub fn destroy(self) -> Result<(), SessionError> {
        self.session.unset_key(&self.name)
    }

    /// Move the namespace data to a new name.
    pub fn rename(&mut self, new_name: &str) -> Result<(), SessionError> {
        let data = self.session.get(&self.name)?.clone();
        self.session.unset_key(&self.name)?;
        self.session.set(new_name, data)?;
        self.name = new_name.to_string();
        Ok(())
    }

    pub fn set_read_only(&mut self) -> &mut Self {
        self.read_only = true;
        self
    }

    pub fn unset_read_only(&mut self) -> &mut Self {
        self.read_only = false;
        self
    }

    /// False when either the session or this namespace is read-only.
    pub fn is_writable(&self) -> bool {
        self.session.is_writable() && !self.read_only
    }
}
