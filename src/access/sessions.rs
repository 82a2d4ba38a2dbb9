//! Live session table, at most one entry per device.

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Connection state of a device. Serialized with the wire labels the
/// clients and the admin dashboard already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
  #[serde(rename = "App Opened")]
  AppOpened,
  Online,
  Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub key: Option<String>,
  pub device_id: String,
  pub ip: Option<String>,
  pub country: Option<String>,
  pub phone: Option<String>,
  pub os: Option<String>,
  #[serde(with = "crate::utils::timestamp")]
  pub time: DateTime,
  pub status: SessionStatus,
}

/// Client-supplied metadata captured when a session is created.
#[derive(Debug, Clone, Default)]
pub struct DeviceMeta {
  pub ip: Option<String>,
  pub country: Option<String>,
  pub phone: Option<String>,
  pub os: Option<String>,
}

impl DeviceMeta {
  fn into_session(
    self,
    device_id: &str,
    key: Option<String>,
    status: SessionStatus,
    now: DateTime,
  ) -> Session {
    Session {
      key,
      device_id: device_id.to_string(),
      ip: self.ip,
      country: self.country,
      phone: self.phone,
      os: self.os,
      time: now,
      status,
    }
  }
}

/// Sessions keyed by device id, with insertion order kept separately so
/// the admin listing stays stable.
#[derive(Debug, Default)]
pub struct SessionTable {
  by_device: HashMap<String, Session>,
  order: Vec<String>,
}

impl SessionTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_sessions(sessions: Vec<Session>) -> Self {
    let mut table = Self::new();
    for session in sessions {
      table.insert(session);
    }
    table
  }

  fn insert(&mut self, session: Session) {
    if !self.by_device.contains_key(&session.device_id) {
      self.order.push(session.device_id.clone());
    }
    self.by_device.insert(session.device_id.clone(), session);
  }

  /// Records an anonymous "app opened" ping. Returns `true` if a new
  /// session was created; an existing one is left untouched, metadata
  /// included.
  pub fn upsert_app_opened(
    &mut self,
    device_id: &str,
    meta: DeviceMeta,
    now: DateTime,
  ) -> bool {
    if self.by_device.contains_key(device_id) {
      return false;
    }
    self.insert(meta.into_session(
      device_id,
      None,
      SessionStatus::AppOpened,
      now,
    ));
    true
  }

  /// Creates or replaces the session for `device_id`, bound to `key` and
  /// online. Returns the key the previous session was bound to, if any.
  pub fn bind(
    &mut self,
    device_id: &str,
    key: &str,
    meta: DeviceMeta,
    now: DateTime,
  ) -> Option<String> {
    let previous =
      self.by_device.get(device_id).and_then(|session| session.key.clone());
    self.insert(meta.into_session(
      device_id,
      Some(key.to_string()),
      SessionStatus::Online,
      now,
    ));
    previous
  }

  pub fn remove(&mut self, device_id: &str) -> Option<Session> {
    let session = self.by_device.remove(device_id)?;
    self.order.retain(|id| id != device_id);
    Some(session)
  }

  pub fn set_status(&mut self, device_id: &str, status: SessionStatus) {
    if let Some(session) = self.by_device.get_mut(device_id) {
      session.status = status;
    }
  }

  pub fn get(&self, device_id: &str) -> Option<&Session> {
    self.by_device.get(device_id)
  }

  pub fn contains(&self, device_id: &str) -> bool {
    self.by_device.contains_key(device_id)
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Sessions in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &Session> {
    self.order.iter().filter_map(|id| self.by_device.get(id))
  }
}
