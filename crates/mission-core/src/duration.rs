//! Serde helpers for representing [`std::time::Duration`] as whole milliseconds.
//!
//! Agent timeouts and poll intervals are configured in milliseconds on the
//! wire and on disk; `std::time::Duration` itself has no default serde
//! representation, so every crate that needs one pulls from here rather than
//! inventing its own.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serialize/deserialize a `Duration` as a whole number of milliseconds.
///
/// ```
/// use std::time::Duration;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Cfg {
///     #[serde(with = "mission_core::duration::duration_millis")]
///     timeout: Duration,
/// }
///
/// let cfg = Cfg { timeout: Duration::from_secs(5) };
/// let json = serde_json::to_string(&cfg).unwrap();
/// assert_eq!(json, r#"{"timeout":5000}"#);
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    /// Serialize a [`Duration`] as milliseconds.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    /// Deserialize a [`Duration`] from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Serialize/deserialize an `Option<Duration>` as milliseconds, or `null`.
pub mod option_duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serialize, Serializer};

    /// Serialize an `Option<Duration>` as milliseconds, or `null`.
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an `Option<Duration>` from milliseconds, or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms: Option<u64> = Option::deserialize(d)?;
        Ok(ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "duration_millis")]
        d: Duration,
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct OptWrapper {
        #[serde(with = "option_duration_millis")]
        d: Option<Duration>,
    }

    #[test]
    fn duration_roundtrips_through_millis() {
        let w = Wrapper { d: Duration::from_millis(1500) };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"d":1500}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.d, Duration::from_millis(1500));
    }

    #[test]
    fn option_duration_none_serializes_to_null() {
        let w = OptWrapper { d: None };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"d":null}"#);
        let back: OptWrapper = serde_json::from_str(&json).unwrap();
        assert!(back.d.is_none());
    }

    #[test]
    fn option_duration_some_roundtrips() {
        let w = OptWrapper { d: Some(Duration::from_secs(300)) };
        let json = serde_json::to_string(&w).unwrap();
        let back: OptWrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.d, Some(Duration::from_secs(300)));
    }
}
