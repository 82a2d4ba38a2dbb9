//! The session/key state machine: ledger, blocklist, session table, and
//! the controller that mutates them as one unit.

mod controller;
mod ledger;
mod registry;
mod sessions;

pub use controller::AccessController;
pub use ledger::{Key, KeyLedger};
pub use registry::DeviceRegistry;
pub use sessions::{DeviceMeta, Session, SessionStatus, SessionTable};
