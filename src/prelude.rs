pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub use anyhow::Context;
pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use tracing::{debug, error, info, warn};

pub use crate::error::{AppError, AppResult};
pub(crate) use crate::utils;
