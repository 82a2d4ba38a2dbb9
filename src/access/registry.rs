//! Administratively blocked devices.

use crate::prelude::*;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
  blocked: BTreeSet<String>,
}

impl DeviceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_devices(devices: impl IntoIterator<Item = String>) -> Self {
    Self { blocked: devices.into_iter().collect() }
  }

  pub fn block(&mut self, device_id: &str) -> bool {
    self.blocked.insert(device_id.to_string())
  }

  pub fn unblock(&mut self, device_id: &str) -> bool {
    self.blocked.remove(device_id)
  }

  pub fn is_blocked(&self, device_id: &str) -> bool {
    self.blocked.contains(device_id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &String> {
    self.blocked.iter()
  }

  pub fn snapshot(&self) -> Vec<String> {
    self.blocked.iter().cloned().collect()
  }
}
