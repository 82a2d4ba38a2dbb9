use crate::prelude::*;

pub fn format_timestamp(ts: DateTime) -> String {
  ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Serde helper for session timestamps, stored as `%Y-%m-%d %H:%M:%S`.
pub mod timestamp {
  use chrono::NaiveDateTime;
  use serde::{Deserialize, Deserializer, Serializer};

  const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

  pub fn serialize<S: Serializer>(
    ts: &NaiveDateTime,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format(FORMAT).to_string())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, FORMAT)
      .map_err(serde::de::Error::custom)
  }
}

/// Serde helper for key expiry dates. The catalog is hand-editable, so an
/// unparseable date reads as "no expiration" instead of failing the load.
pub mod expiry {
  use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
  use serde::{Deserialize, Deserializer, Serializer};

  const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

  pub(crate) fn parse(raw: &str) -> Option<NaiveDateTime> {
    for format in [FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
      if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(ts);
      }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
      .ok()
      .map(|date| date.and_time(NaiveTime::MIN))
  }

  pub fn serialize<S: Serializer>(
    ts: &Option<NaiveDateTime>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match ts {
      Some(ts) => {
        serializer.serialize_some(&ts.format(FORMAT).to_string())
      }
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<NaiveDateTime>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_common_expiry_formats() {
    for raw in ["2026-01-31T00:00:00", "2026-01-31 00:00:00", "2026-01-31"] {
      assert!(expiry::parse(raw).is_some(), "failed to parse {raw}");
    }
  }

  #[test]
  fn garbage_expiry_is_none() {
    assert_eq!(expiry::parse("next tuesday"), None);
    assert_eq!(expiry::parse(""), None);
  }

  #[test]
  fn formats_session_timestamps() {
    let ts = expiry::parse("2026-01-31T12:30:45").unwrap();
    assert_eq!(format_timestamp(ts), "2026-01-31 12:30:45");
  }
}
