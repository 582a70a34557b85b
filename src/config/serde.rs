use std::time::Duration;

use humantime::{format_duration, parse_duration};
use serde::Deserialize;
use serde_with::{DeserializeAs, SerializeAs};

/// `serde_with` adapter reading durations such as `"10s"` or `"450ms"`.
pub(super) struct HumantimeDuration;

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

impl SerializeAs<Duration> for HumantimeDuration {
    fn serialize_as<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format_duration(*value).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::HumantimeDuration;
    use serde::{Deserialize, Serialize};
    use serde_with::serde_as;
    use std::time::Duration;

    #[serde_as]
    #[derive(Deserialize, Serialize)]
    struct Timing {
        #[serde_as(as = "HumantimeDuration")]
        exit: Duration,
    }

    #[test]
    fn reads_and_writes_humantime_strings() {
        let timing: Timing = match serde_json::from_str(r#"{"exit":" 450ms "}"#) {
            Ok(value) => value,
            Err(err) => panic!("failed to parse timing json: {err}"),
        };
        assert_eq!(timing.exit, Duration::from_millis(450));

        let json = match serde_json::to_string(&timing) {
            Ok(json) => json,
            Err(err) => panic!("failed to write timing json: {err}"),
        };
        assert_eq!(json, r#"{"exit":"450ms"}"#);
    }

    #[test]
    fn rejects_bare_numbers_as_text() {
        assert!(serde_json::from_str::<Timing>(r#"{"exit":"10"}"#).is_err());
    }
}
