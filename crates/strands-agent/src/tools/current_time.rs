//! `current_time` tool: reports the current time in ISO-8601.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::ToolOutput;

use super::{Tool, ToolError, ToolSpec};

pub struct CurrentTime;

impl CurrentTime {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "current_time",
            "Get the current date and time in ISO-8601 format.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "\"UTC\" (default), \"local\", or a fixed offset such as \"+05:30\""
                    }
                },
                "additionalProperties": false
            }),
            CurrentTime,
        )
    }
}

#[async_trait]
impl Tool for CurrentTime {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let timezone = arguments
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC");
        let now = format_in_zone(Utc::now(), timezone).map_err(ToolError::new)?;
        Ok(ToolOutput::Text(now))
    }
}

fn format_in_zone(now: DateTime<Utc>, timezone: &str) -> Result<String, String> {
    let tz = timezone.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") {
        return Ok(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if tz.eq_ignore_ascii_case("local") {
        return Ok(now
            .with_timezone(&Local)
            .to_rfc3339_opts(SecondsFormat::Secs, false));
    }
    let offset = parse_offset(tz)?;
    Ok(now
        .with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    let unsupported = || format!("unsupported timezone `{raw}`; use UTC, local, or +HH:MM");

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(unsupported()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(unsupported());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(unsupported()),
    };
    let hours: i32 = hours.parse().map_err(|_| unsupported())?;
    let minutes: i32 = minutes.parse().map_err(|_| unsupported())?;
    if hours > 23 || minutes > 59 {
        return Err(unsupported());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn utc_format() {
        assert_eq!(
            format_in_zone(fixed_now(), "UTC").unwrap(),
            "2025-03-14T15:09:26Z"
        );
    }

    #[test]
    fn fixed_offsets() {
        assert_eq!(
            format_in_zone(fixed_now(), "+05:30").unwrap(),
            "2025-03-14T20:39:26+05:30"
        );
        assert_eq!(
            format_in_zone(fixed_now(), "-0800").unwrap(),
            "2025-03-14T07:09:26-08:00"
        );
        assert_eq!(
            format_in_zone(fixed_now(), "+02").unwrap(),
            "2025-03-14T17:09:26+02:00"
        );
    }

    #[test]
    fn rejects_named_zones_and_garbage() {
        assert!(format_in_zone(fixed_now(), "Europe/Paris").is_err());
        assert!(format_in_zone(fixed_now(), "+25:00").is_err());
        assert!(format_in_zone(fixed_now(), "+5:3").is_err());
        assert!(format_in_zone(fixed_now(), "+ab:cd").is_err());
    }

    #[tokio::test]
    async fn default_is_utc() {
        let output = CurrentTime.call(&Map::new()).await.unwrap();
        let text = output.to_text();
        assert!(text.ends_with('Z'), "{text}");
        assert!(DateTime::parse_from_rfc3339(&text).is_ok());
    }

    #[tokio::test]
    async fn bad_timezone_is_tool_error() {
        let mut args = Map::new();
        args.insert("timezone".into(), json!("Mars/Olympus"));
        assert!(CurrentTime.call(&args).await.is_err());
    }
}
