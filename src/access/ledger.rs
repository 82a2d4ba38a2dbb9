//! License key ledger: per-key device capacity, consumption, expiry.

use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
  /// Maximum concurrent devices this key may be redeemed on.
  #[serde(rename = "devices")]
  pub device_limit: usize,
  #[serde(default)]
  pub used_devices: Vec<String>,
  #[serde(default, rename = "expires", with = "crate::utils::expiry")]
  pub expires_at: Option<DateTime>,
  #[serde(default)]
  pub blocked: bool,
}

impl Key {
  pub fn new(device_limit: usize, expires_at: Option<DateTime>) -> Self {
    Self { device_limit, used_devices: Vec::new(), expires_at, blocked: false }
  }
}

#[derive(Debug, Default)]
pub struct KeyLedger {
  keys: BTreeMap<String, Key>,
}

impl KeyLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_keys(keys: BTreeMap<String, Key>) -> Self {
    Self { keys }
  }

  pub fn lookup(&self, token: &str) -> Option<&Key> {
    self.keys.get(token)
  }

  pub fn insert(&mut self, token: String, key: Key) {
    self.keys.insert(token, key);
  }

  /// Consumes a device slot on `token`. Re-redemption by a device already
  /// holding a slot succeeds without consuming another one.
  pub fn redeem(&mut self, token: &str, device_id: &str) -> AppResult<()> {
    let key = self.keys.get_mut(token).ok_or(AppError::InvalidKey)?;
    if key.blocked {
      return Err(AppError::Blocked);
    }
    if key.used_devices.iter().any(|used| used == device_id) {
      return Ok(());
    }
    if key.used_devices.len() >= key.device_limit {
      return Err(AppError::DeviceLimitReached);
    }
    key.used_devices.push(device_id.to_string());
    Ok(())
  }

  /// Frees the slot `device_id` holds on `token`, if any. Tolerates the
  /// token no longer existing (already revoked by a block).
  pub fn release(&mut self, token: &str, device_id: &str) -> bool {
    match self.keys.get_mut(token) {
      Some(key) => {
        let before = key.used_devices.len();
        key.used_devices.retain(|used| used != device_id);
        key.used_devices.len() != before
      }
      None => false,
    }
  }

  /// Deletes the key outright, for all of its devices.
  pub fn revoke(&mut self, token: &str) -> bool {
    self.keys.remove(token).is_some()
  }

  pub fn set_blocked(&mut self, token: &str, blocked: bool) -> AppResult<()> {
    let key = self.keys.get_mut(token).ok_or(AppError::InvalidKey)?;
    key.blocked = blocked;
    Ok(())
  }

  /// Whole days until expiry, clamped to zero. `None` when the key is
  /// unknown or carries no expiration.
  pub fn remaining_days(&self, token: &str, now: DateTime) -> Option<i64> {
    let expires_at = self.lookup(token)?.expires_at?;
    Some((expires_at - now).num_days().max(0))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Key)> {
    self.keys.iter()
  }

  pub fn keys(&self) -> &BTreeMap<String, Key> {
    &self.keys
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::prelude::*;

  fn ledger_with(token: &str, limit: usize) -> KeyLedger {
    let mut ledger = KeyLedger::new();
    ledger.insert(token.to_string(), Key::new(limit, None));
    ledger
  }

  #[test]
  fn redeem_fills_slots_up_to_limit() {
    let mut ledger = ledger_with("ABC", 2);

    ledger.redeem("ABC", "d1").unwrap();
    ledger.redeem("ABC", "d2").unwrap();
    assert!(matches!(
      ledger.redeem("ABC", "d3"),
      Err(AppError::DeviceLimitReached)
    ));

    assert!(ledger.release("ABC", "d1"));
    ledger.redeem("ABC", "d3").unwrap();
    assert_eq!(ledger.lookup("ABC").unwrap().used_devices, ["d2", "d3"]);
  }

  #[test]
  fn redeem_is_idempotent_per_device() {
    let mut ledger = ledger_with("ABC", 1);

    ledger.redeem("ABC", "d1").unwrap();
    ledger.redeem("ABC", "d1").unwrap();
    assert_eq!(ledger.lookup("ABC").unwrap().used_devices.len(), 1);
  }

  #[test]
  fn redeem_unknown_or_blocked_key_fails() {
    let mut ledger = ledger_with("ABC", 1);
    ledger.set_blocked("ABC", true).unwrap();

    assert!(matches!(ledger.redeem("nope", "d1"), Err(AppError::InvalidKey)));
    assert!(matches!(ledger.redeem("ABC", "d1"), Err(AppError::Blocked)));
  }

  #[test]
  fn release_tolerates_missing_token_and_device() {
    let mut ledger = ledger_with("ABC", 1);

    assert!(!ledger.release("gone", "d1"));
    assert!(!ledger.release("ABC", "d1"));
  }

  #[test]
  fn revoke_removes_key_entirely() {
    let mut ledger = ledger_with("ABC", 2);
    ledger.redeem("ABC", "d1").unwrap();

    assert!(ledger.revoke("ABC"));
    assert!(!ledger.revoke("ABC"));
    assert!(ledger.lookup("ABC").is_none());
  }

  #[test]
  fn remaining_days_clamps_to_zero() {
    let now = utils::expiry::parse("2026-08-06T00:00:00").unwrap();

    let mut ledger = KeyLedger::new();
    ledger.insert(
      "fresh".into(),
      Key::new(1, utils::expiry::parse("2026-08-16T12:00:00")),
    );
    ledger.insert(
      "stale".into(),
      Key::new(1, utils::expiry::parse("2026-01-01T00:00:00")),
    );
    ledger.insert("open".into(), Key::new(1, None));

    assert_eq!(ledger.remaining_days("fresh", now), Some(10));
    assert_eq!(ledger.remaining_days("stale", now), Some(0));
    assert_eq!(ledger.remaining_days("open", now), None);
    assert_eq!(ledger.remaining_days("unknown", now), None);
  }
}
