use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::access::DeviceMeta;
use crate::model::*;
use crate::prelude::*;
use crate::state::AppState;

/// First `X-Forwarded-For` entry when present (the server sits behind a
/// reverse proxy in production), otherwise the peer address.
fn real_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
  headers
    .get("x-forwarded-for")
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.split(',').next())
    .map(|value| value.trim().to_string())
    .unwrap_or_else(|| addr.ip().to_string())
}

pub async fn app_opened(
  State(app): State<Arc<AppState>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  Json(req): Json<AppOpenedReq>,
) -> AppResult<Json<Ack>> {
  let meta = DeviceMeta {
    ip: Some(real_ip(&headers, addr)),
    country: req.country,
    phone: req.phone,
    os: req.os,
  };

  let mut core = app.core.lock().await;
  let created = core.handle_app_opened(&req.device_id, meta)?;
  if created {
    debug!("device {} opened the app", req.device_id);
    app.store.save_sessions(&core.session_snapshot()).await?;
  }
  Ok(Json(Ack::new("App accessed")))
}

pub async fn key_login(
  State(app): State<Arc<AppState>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  Json(req): Json<KeyLoginReq>,
) -> AppResult<Json<Ack>> {
  let meta = DeviceMeta {
    ip: Some(real_ip(&headers, addr)),
    country: req.country,
    phone: req.phone,
    os: req.os,
  };

  let mut core = app.core.lock().await;
  core.handle_key_login(&req.key, &req.device_id, meta)?;
  info!("device {} redeemed a key", req.device_id);

  app.store.save_sessions(&core.session_snapshot()).await?;
  app.store.save_keys(&core.key_snapshot()).await?;
  Ok(Json(Ack::new("Key activated successfully")))
}

pub async fn disconnect(
  State(app): State<Arc<AppState>>,
  Json(req): Json<DeviceReq>,
) -> AppResult<Json<Ack>> {
  disconnect_inner(&app, &req.device_id).await?;
  Ok(Json(Ack::new(format!("Device {} disconnected", req.device_id))))
}

pub async fn disconnect_device_direct(
  State(app): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> AppResult<Json<ChangeRes>> {
  disconnect_inner(&app, &device_id).await?;
  Ok(Json(ChangeRes {
    success: true,
    message: format!("Device {device_id} disconnected"),
  }))
}

async fn disconnect_inner(app: &AppState, device_id: &str) -> AppResult<()> {
  let mut core = app.core.lock().await;
  let released = core.disconnect(device_id);

  // persisted even when no session existed
  app.store.save_sessions(&core.session_snapshot()).await?;
  if released.is_some() {
    app.store.save_keys(&core.key_snapshot()).await?;
  }
  Ok(())
}

pub async fn status(
  State(app): State<Arc<AppState>>,
) -> Json<StatusSummary> {
  Json(app.core.lock().await.status())
}

pub async fn blocked_devices(
  State(app): State<Arc<AppState>>,
) -> Json<BlockedRes> {
  Json(BlockedRes { blocked: app.core.lock().await.registry().snapshot() })
}

pub async fn health() -> &'static str {
  "OK"
}

// ---- admin surface, behind `require_admin` ----

pub async fn require_admin(
  State(app): State<Arc<AppState>>,
  req: Request,
  next: Next,
) -> Response {
  let authorized = req
    .headers()
    .get("x-admin-token")
    .and_then(|value| value.to_str().ok())
    .map(|value| value == app.config.admin_token)
    .unwrap_or(false);

  if !authorized {
    let body = json::json!({ "success": false, "error": "Unauthorized" });
    return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
  }
  next.run(req).await
}

pub async fn user_details(
  State(app): State<Arc<AppState>>,
) -> Json<Vec<SessionRecord>> {
  Json(app.core.lock().await.detailed_listing())
}

pub async fn block_device(
  State(app): State<Arc<AppState>>,
  Json(req): Json<DeviceReq>,
) -> AppResult<Json<ChangeRes>> {
  block_inner(&app, &req.device_id).await
}

pub async fn block_device_direct(
  State(app): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> AppResult<Json<ChangeRes>> {
  block_inner(&app, &device_id).await
}

async fn block_inner(
  app: &AppState,
  device_id: &str,
) -> AppResult<Json<ChangeRes>> {
  let mut core = app.core.lock().await;
  let revoked = core.block_device(device_id);

  app.store.save_sessions(&core.session_snapshot()).await?;
  if let Some(token) = revoked {
    warn!("blocked device {device_id}, revoked its key {token}");
    app.store.save_keys(&core.key_snapshot()).await?;
  } else {
    warn!("blocked device {device_id}");
  }
  Ok(Json(ChangeRes {
    success: true,
    message: format!("Device {device_id} blocked"),
  }))
}

pub async fn unblock_device(
  State(app): State<Arc<AppState>>,
  Json(req): Json<DeviceReq>,
) -> AppResult<Json<ChangeRes>> {
  unblock_inner(&app, &req.device_id).await
}

pub async fn unblock_device_direct(
  State(app): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> AppResult<Json<ChangeRes>> {
  unblock_inner(&app, &device_id).await
}

async fn unblock_inner(
  app: &AppState,
  device_id: &str,
) -> AppResult<Json<ChangeRes>> {
  let mut core = app.core.lock().await;
  let changed = core.unblock_device(device_id);

  let message = if changed {
    app.store.save_sessions(&core.session_snapshot()).await?;
    info!("unblocked device {device_id}");
    format!("Device {device_id} unblocked")
  } else {
    format!("Device {device_id} was not blocked")
  };
  Ok(Json(ChangeRes { success: changed, message }))
}

pub async fn create_key(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateKeyReq>,
) -> AppResult<Json<CreateKeyRes>> {
  let mut core = app.core.lock().await;
  let (token, key) = core.create_key(req.devices, req.days);

  app.store.save_keys(&core.key_snapshot()).await?;
  info!("created key {} with device limit {}", token, key.device_limit);
  Ok(Json(CreateKeyRes {
    success: true,
    key: token,
    expires: key.expires_at.map(utils::format_timestamp),
  }))
}

pub async fn list_keys(
  State(app): State<Arc<AppState>>,
) -> Json<Vec<KeyRecord>> {
  Json(app.core.lock().await.list_keys())
}

pub async fn block_key(
  State(app): State<Arc<AppState>>,
  Path(key): Path<String>,
) -> AppResult<Json<ChangeRes>> {
  set_key_blocked_inner(&app, &key, true).await
}

pub async fn unblock_key(
  State(app): State<Arc<AppState>>,
  Path(key): Path<String>,
) -> AppResult<Json<ChangeRes>> {
  set_key_blocked_inner(&app, &key, false).await
}

async fn set_key_blocked_inner(
  app: &AppState,
  token: &str,
  blocked: bool,
) -> AppResult<Json<ChangeRes>> {
  let mut core = app.core.lock().await;
  core.set_key_blocked(token, blocked)?;

  app.store.save_keys(&core.key_snapshot()).await?;
  let action = if blocked { "blocked" } else { "unblocked" };
  warn!("{action} key {token}");
  Ok(Json(ChangeRes {
    success: true,
    message: format!("Key {token} {action}"),
  }))
}
