//! The orchestrating core. All three stores are owned here and mutate as
//! one unit per operation; a failed operation leaves them untouched.

use uuid::Uuid;

use super::{
  DeviceMeta, DeviceRegistry, Key, KeyLedger, SessionStatus, SessionTable,
};
use crate::model::{KeyRecord, SessionRecord, StatusSummary};
use crate::persist::{KeyCatalog, PersistedSessions};
use crate::prelude::*;

pub struct AccessController {
  ledger: KeyLedger,
  registry: DeviceRegistry,
  sessions: SessionTable,
}

impl AccessController {
  pub fn new(
    ledger: KeyLedger,
    registry: DeviceRegistry,
    sessions: SessionTable,
  ) -> Self {
    Self { ledger, registry, sessions }
  }

  /// Anonymous "app opened" ping. Returns `true` when a new session was
  /// created, so the caller knows whether anything needs persisting.
  pub fn handle_app_opened(
    &mut self,
    device_id: &str,
    meta: DeviceMeta,
  ) -> AppResult<bool> {
    if device_id.is_empty() {
      return Err(AppError::InvalidInput("device_id"));
    }
    if self.registry.is_blocked(device_id) {
      return Err(AppError::Blocked);
    }
    Ok(self.sessions.upsert_app_opened(device_id, meta, Utc::now().naive_utc()))
  }

  /// Redeems `token` for `device_id` and binds an online session. All
  /// preconditions are checked before the first mutation. If the device was
  /// previously bound to a different key, its slot there is released so a
  /// device never consumes slots on two keys at once.
  pub fn handle_key_login(
    &mut self,
    token: &str,
    device_id: &str,
    meta: DeviceMeta,
  ) -> AppResult<()> {
    if token.is_empty() {
      return Err(AppError::InvalidKey);
    }
    if device_id.is_empty() {
      return Err(AppError::InvalidInput("device_id"));
    }

    let key = self.ledger.lookup(token).ok_or(AppError::InvalidKey)?;
    if key.blocked || self.registry.is_blocked(device_id) {
      return Err(AppError::Blocked);
    }

    self.ledger.redeem(token, device_id)?;
    let previous =
      self.sessions.bind(device_id, token, meta, Utc::now().naive_utc());
    if let Some(previous) = previous.filter(|previous| previous != token) {
      self.ledger.release(&previous, device_id);
    }
    Ok(())
  }

  /// Drops the device's session and frees its key slot. Idempotent: a
  /// device without a session disconnects successfully and changes nothing
  /// in the ledger. Returns the released key, if any.
  pub fn disconnect(&mut self, device_id: &str) -> Option<String> {
    let key =
      self.sessions.remove(device_id).and_then(|session| session.key);
    if let Some(token) = &key {
      self.ledger.release(token, device_id);
    }
    key
  }

  /// Blocks the device and retires its bound key outright. The key is
  /// deleted for all of its devices, not just this one. Returns the revoked
  /// token, if a key was actually removed from the ledger.
  pub fn block_device(&mut self, device_id: &str) -> Option<String> {
    self.sessions.set_status(device_id, SessionStatus::Blocked);
    self.registry.block(device_id);

    let token =
      self.sessions.get(device_id).and_then(|session| session.key.clone());
    token.filter(|token| self.ledger.revoke(token))
  }

  /// Removes the device from the blocklist and puts any live session back
  /// online. Returns `false` when the device was not blocked to begin with.
  pub fn unblock_device(&mut self, device_id: &str) -> bool {
    let changed = self.registry.unblock(device_id);
    if changed {
      self.sessions.set_status(device_id, SessionStatus::Online);
    }
    changed
  }

  /// Mints a new key with a generated token. `days` of `None` means the
  /// key never expires.
  pub fn create_key(
    &mut self,
    device_limit: usize,
    days: Option<i64>,
  ) -> (String, Key) {
    let token = Uuid::new_v4().to_string();
    let expires_at =
      days.map(|days| Utc::now().naive_utc() + TimeDelta::days(days));
    let key = Key::new(device_limit, expires_at);
    self.ledger.insert(token.clone(), key.clone());
    (token, key)
  }

  pub fn set_key_blocked(
    &mut self,
    token: &str,
    blocked: bool,
  ) -> AppResult<()> {
    self.ledger.set_blocked(token, blocked)
  }

  /// One record per live session, with the block status recomputed from
  /// the registry, plus placeholder records for blocked devices that have
  /// no session. Device ids never repeat.
  pub fn detailed_listing(&self) -> Vec<SessionRecord> {
    let now = Utc::now().naive_utc();
    let mut records: Vec<_> = self
      .sessions
      .iter()
      .map(|session| {
        let status = if self.registry.is_blocked(&session.device_id) {
          SessionStatus::Blocked
        } else {
          session.status
        };
        SessionRecord {
          key: session.key.clone(),
          device_id: session.device_id.clone(),
          ip: session.ip.clone(),
          country: session.country.clone(),
          phone: session.phone.clone(),
          os: session.os.clone(),
          time: Some(utils::format_timestamp(session.time)),
          status,
          days_left: session
            .key
            .as_deref()
            .and_then(|token| self.ledger.remaining_days(token, now)),
        }
      })
      .collect();

    for device_id in self.registry.iter() {
      if !self.sessions.contains(device_id) {
        records.push(SessionRecord::blocked_placeholder(device_id));
      }
    }
    records
  }

  pub fn list_keys(&self) -> Vec<KeyRecord> {
    let now = Utc::now().naive_utc();
    self
      .ledger
      .iter()
      .map(|(token, key)| KeyRecord {
        key: token.clone(),
        devices: key.device_limit,
        used: key.used_devices.len(),
        blocked: key.blocked,
        expires: key.expires_at.map(utils::format_timestamp),
        days_left: self.ledger.remaining_days(token, now),
      })
      .collect()
  }

  pub fn status(&self) -> StatusSummary {
    let activated_keys = self
      .sessions
      .iter()
      .filter_map(|session| session.key.as_deref())
      .collect::<HashSet<_>>()
      .len();
    StatusSummary { active_users: self.sessions.len(), activated_keys }
  }

  pub fn session_snapshot(&self) -> PersistedSessions {
    PersistedSessions {
      active_sessions: self.sessions.iter().cloned().collect(),
      blocked_devices: self.registry.snapshot(),
    }
  }

  pub fn key_snapshot(&self) -> KeyCatalog {
    KeyCatalog { keys: self.ledger.keys().clone() }
  }

  pub fn registry(&self) -> &DeviceRegistry {
    &self.registry
  }
}
