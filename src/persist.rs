//! Durable state: the key catalog in one JSON file, session state plus the
//! blocklist in another. In-memory state stays the source of truth during a
//! process lifetime; a failed write is surfaced to the caller but never
//! rolled back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::access::{Key, Session};
use crate::prelude::*;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeyCatalog {
  #[serde(default)]
  pub keys: BTreeMap<String, Key>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedSessions {
  #[serde(default)]
  pub active_sessions: Vec<Session>,
  #[serde(default)]
  pub blocked_devices: Vec<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn load_keys(&self) -> anyhow::Result<KeyCatalog>;
  async fn load_sessions(&self) -> anyhow::Result<PersistedSessions>;
  async fn save_keys(&self, catalog: &KeyCatalog) -> anyhow::Result<()>;
  async fn save_sessions(
    &self,
    state: &PersistedSessions,
  ) -> anyhow::Result<()>;
}

pub struct JsonStore {
  keys_path: PathBuf,
  sessions_path: PathBuf,
}

impl JsonStore {
  pub fn new(
    keys_path: impl Into<PathBuf>,
    sessions_path: impl Into<PathBuf>,
  ) -> Self {
    Self { keys_path: keys_path.into(), sessions_path: sessions_path.into() }
  }

  /// A missing file is an empty state, not an error.
  async fn read_or_default<T: DeserializeOwned + Default>(
    path: &Path,
  ) -> anyhow::Result<T> {
    if !fs::try_exists(path).await? {
      return Ok(T::default());
    }
    let bytes = fs::read(path)
      .await
      .with_context(|| format!("reading {}", path.display()))?;
    json::from_slice(&bytes)
      .with_context(|| format!("parsing {}", path.display()))
  }

  /// Writes to a temp file, then renames over the previous state.
  async fn write_json<T: Serialize>(
    path: &Path,
    value: &T,
  ) -> anyhow::Result<()> {
    let bytes = json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)
      .await
      .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
      .await
      .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
  }
}

#[async_trait]
impl Store for JsonStore {
  async fn load_keys(&self) -> anyhow::Result<KeyCatalog> {
    Self::read_or_default(&self.keys_path).await
  }

  async fn load_sessions(&self) -> anyhow::Result<PersistedSessions> {
    Self::read_or_default(&self.sessions_path).await
  }

  async fn save_keys(&self, catalog: &KeyCatalog) -> anyhow::Result<()> {
    Self::write_json(&self.keys_path, catalog).await
  }

  async fn save_sessions(
    &self,
    state: &PersistedSessions,
  ) -> anyhow::Result<()> {
    Self::write_json(&self.sessions_path, state).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::access::SessionStatus;
  use crate::prelude::*;

  fn store_in(dir: &Path) -> JsonStore {
    JsonStore::new(dir.join("data.json"), dir.join("sessions.json"))
  }

  #[tokio::test]
  async fn missing_files_load_as_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    assert!(store.load_keys().await.unwrap().keys.is_empty());
    let state = store.load_sessions().await.unwrap();
    assert!(state.active_sessions.is_empty());
    assert!(state.blocked_devices.is_empty());
  }

  #[tokio::test]
  async fn catalog_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let mut catalog = KeyCatalog::default();
    let mut key = Key::new(3, utils::expiry::parse("2026-12-31T00:00:00"));
    key.used_devices.push("d1".into());
    key.blocked = true;
    catalog.keys.insert("ABC".into(), key);

    store.save_keys(&catalog).await.unwrap();
    let loaded = store.load_keys().await.unwrap();
    assert_eq!(loaded.keys, catalog.keys);
  }

  #[tokio::test]
  async fn session_state_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let state = PersistedSessions {
      active_sessions: vec![Session {
        key: Some("ABC".into()),
        device_id: "d1".into(),
        ip: Some("10.0.0.1".into()),
        country: None,
        phone: None,
        os: Some("android 14".into()),
        time: utils::expiry::parse("2026-08-06T10:00:00").unwrap(),
        status: SessionStatus::Online,
      }],
      blocked_devices: vec!["d2".into()],
    };

    store.save_sessions(&state).await.unwrap();
    let loaded = store.load_sessions().await.unwrap();
    assert_eq!(loaded.active_sessions.len(), 1);
    assert_eq!(loaded.active_sessions[0].device_id, "d1");
    assert_eq!(loaded.active_sessions[0].status, SessionStatus::Online);
    assert_eq!(loaded.active_sessions[0].time, state.active_sessions[0].time);
    assert_eq!(loaded.blocked_devices, ["d2"]);
  }

  #[tokio::test]
  async fn malformed_expiry_loads_as_no_expiration() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let raw = json::json!({
      "keys": {
        "ABC": { "devices": 2, "used_devices": [], "expires": "soonish" }
      }
    });
    std::fs::write(dir.path().join("data.json"), raw.to_string()).unwrap();

    let catalog = store.load_keys().await.unwrap();
    let key = &catalog.keys["ABC"];
    assert_eq!(key.expires_at, None);
    assert!(!key.blocked);
  }
}
