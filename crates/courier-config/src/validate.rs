//! Validation helpers turning raw string values into typed settings.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::ConfigSource;

pub(crate) fn required(source: &ConfigSource, key: &'static str) -> ConfigResult<String> {
    let value = source.get(key).ok_or(ConfigError::MissingField { key })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(key, "empty", None));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn required_path(source: &ConfigSource, key: &'static str) -> ConfigResult<PathBuf> {
    required(source, key).map(PathBuf::from)
}

pub(crate) fn optional(source: &ConfigSource, key: &'static str) -> Option<String> {
    source
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn optional_or(source: &ConfigSource, key: &'static str, default: &str) -> String {
    optional(source, key).unwrap_or_else(|| default.to_string())
}

pub(crate) fn parse_port(key: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(key, "not_a_number", Some(value)))?;
    if !(1..=65_535).contains(&port) {
        return Err(ConfigError::invalid(key, "out_of_range", Some(value)));
    }
    u16::try_from(port).map_err(|_| ConfigError::invalid(key, "out_of_range", Some(value)))
}

pub(crate) fn parse_usize(
    source: &ConfigSource,
    key: &'static str,
    default: usize,
) -> ConfigResult<usize> {
    optional(source, key).map_or(Ok(default), |value| {
        value
            .parse::<usize>()
            .map_err(|_| ConfigError::invalid(key, "not_a_number", Some(&value)))
    })
}

pub(crate) fn parse_secs(
    source: &ConfigSource,
    key: &'static str,
    default: u64,
) -> ConfigResult<Duration> {
    let secs = optional(source, key).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|_| ConfigError::invalid(key, "not_a_number", Some(&value)))
    })?;
    if secs == 0 {
        return Err(ConfigError::invalid(key, "out_of_range", Some("0")));
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn parse_with<T>(source: &ConfigSource, key: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr<Err = ConfigError>,
{
    optional(source, key).map(|value| value.parse::<T>()).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_accepts_valid_range() -> ConfigResult<()> {
        assert_eq!(parse_port("port", "22")?, 22);
        assert_eq!(parse_port("port", "65535")?, 65_535);
        Ok(())
    }

    #[test]
    fn parse_port_rejects_out_of_range_and_non_numeric() {
        assert!(matches!(
            parse_port("port", "0"),
            Err(ConfigError::InvalidField {
                reason: "out_of_range",
                ..
            })
        ));
        assert!(matches!(
            parse_port("port", "70000"),
            Err(ConfigError::InvalidField {
                reason: "out_of_range",
                ..
            })
        ));
        assert!(matches!(
            parse_port("port", "ssh"),
            Err(ConfigError::InvalidField {
                reason: "not_a_number",
                ..
            })
        ));
    }

    #[test]
    fn required_rejects_blank_values() {
        let source = ConfigSource::from_pairs([("KEY", "   ")]);
        assert!(matches!(
            required(&source, "KEY"),
            Err(ConfigError::InvalidField { reason: "empty", .. })
        ));
        assert!(matches!(
            required(&source, "OTHER"),
            Err(ConfigError::MissingField { key: "OTHER" })
        ));
    }

    #[test]
    fn parse_secs_rejects_zero_and_uses_default() -> ConfigResult<()> {
        let source = ConfigSource::from_pairs([("ZERO", "0")]);
        assert!(parse_secs(&source, "ZERO", 5).is_err());
        assert_eq!(parse_secs(&source, "UNSET", 5)?, Duration::from_secs(5));
        Ok(())
    }
}
