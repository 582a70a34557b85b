use std::time::Duration;

use humantime::parse_duration;

use crate::error::ConfigError;

/// Value of `key`, trimmed. Unset and blank variables both read as `None`.
pub(super) fn env_string(key: &'static str) -> std::result::Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(ConfigError::InvalidField {
            field: key,
            message: err.to_string(),
        }),
    }
}

pub(super) fn env_parse<T>(key: &'static str) -> std::result::Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)?
        .map(|value| {
            value.parse::<T>().map_err(|err| ConfigError::InvalidField {
                field: key,
                message: err.to_string(),
            })
        })
        .transpose()
}

/// Accepts the usual spellings of a switch (`true`/`1`/`yes`/`on` and their
/// opposites), case-insensitively.
pub(super) fn env_flag(key: &'static str) -> std::result::Result<Option<bool>, ConfigError> {
    env_string(key)?
        .map(|value| {
            parse_flag(&value).ok_or_else(|| ConfigError::InvalidField {
                field: key,
                message: format!("expected a boolean, got `{value}`"),
            })
        })
        .transpose()
}

pub(super) fn env_duration(
    key: &'static str,
) -> std::result::Result<Option<Duration>, ConfigError> {
    env_string(key)?
        .map(|value| {
            parse_duration(&value).map_err(|err| ConfigError::InvalidField {
                field: key,
                message: err.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
