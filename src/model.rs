//! Wire shapes for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::access::SessionStatus;

#[derive(Debug, Deserialize)]
pub struct AppOpenedReq {
  pub device_id: String,
  pub country: Option<String>,
  pub phone: Option<String>,
  pub os: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyLoginReq {
  pub key: String,
  pub device_id: String,
  pub country: Option<String>,
  pub phone: Option<String>,
  pub os: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceReq {
  pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct Ack {
  pub message: String,
}

impl Ack {
  pub fn new(message: impl Into<String>) -> Self {
    Self { message: message.into() }
  }
}

/// Admin mutation result: `success` reports whether anything changed.
#[derive(Debug, Serialize)]
pub struct ChangeRes {
  pub success: bool,
  pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
  pub active_users: usize,
  pub activated_keys: usize,
}

#[derive(Debug, Serialize)]
pub struct BlockedRes {
  pub blocked: Vec<String>,
}

/// One row of the admin listing. Blocked devices without a live session
/// appear as placeholder rows with everything but the id and status null.
#[derive(Debug, Serialize)]
pub struct SessionRecord {
  pub key: Option<String>,
  pub device_id: String,
  pub ip: Option<String>,
  pub country: Option<String>,
  pub phone: Option<String>,
  pub os: Option<String>,
  pub time: Option<String>,
  pub status: SessionStatus,
  pub days_left: Option<i64>,
}

impl SessionRecord {
  pub fn blocked_placeholder(device_id: &str) -> Self {
    Self {
      key: None,
      device_id: device_id.to_string(),
      ip: None,
      country: None,
      phone: None,
      os: None,
      time: None,
      status: SessionStatus::Blocked,
      days_left: None,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyReq {
  pub devices: usize,
  pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyRes {
  pub success: bool,
  pub key: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeyRecord {
  pub key: String,
  pub devices: usize,
  pub used: usize,
  pub blocked: bool,
  pub expires: Option<String>,
  pub days_left: Option<i64>,
}
