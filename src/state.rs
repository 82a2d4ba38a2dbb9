use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::access::AccessController;
use crate::persist::Store;

#[derive(Debug, Clone)]
pub struct Config {
  pub keys_path: PathBuf,
  pub sessions_path: PathBuf,
  pub admin_token: String,
}

pub struct AppState {
  /// The one mutual-exclusion domain for ledger, registry and sessions.
  /// Held across the persistence write too, which keeps snapshot writes
  /// in mutation order.
  pub core: Mutex<AccessController>,
  pub store: Box<dyn Store>,
  pub config: Config,
}

impl AppState {
  pub fn new(
    controller: AccessController,
    store: impl Store + 'static,
    config: Config,
  ) -> Self {
    Self { core: Mutex::new(controller), store: Box::new(store), config }
  }
}
