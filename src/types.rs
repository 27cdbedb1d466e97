use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Reserved name of the task executed when no task is requested.
pub const DEFAULT_TASK: &str = "default";

/// How a watch group executes its bound tasks when triggered.
///
/// - `NewProcess`: every trigger spawns a fresh `buildflow run <task>` child
///   process per bound task (default).
/// - `InProcess`: bound tasks run inside the watching process, reusing the
///   already-loaded task registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnPolicy {
    #[default]
    NewProcess,
    InProcess,
}

impl fmt::Display for SpawnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpawnPolicy::NewProcess => "new-process",
            SpawnPolicy::InProcess => "in-process",
        })
    }
}

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(ms|s|m|h)$").expect("duration regex is valid")
});

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let caps = DURATION_RE.captures(s).ok_or_else(|| {
        format!("invalid duration '{s}'; expected a number followed by ms, s, m, or h")
    })?;

    let value: u64 = caps[1]
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", &caps[1], e))?;

    let secs_per_unit = match &caps[2] {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        _ => 60 * 60,
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("100").is_err());
        assert!(parse_duration("5 days").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn rejects_overflowing_durations() {
        assert!(parse_duration("9999999999999999h").unwrap_err().contains("too large"));
        assert!(parse_duration("999999999999999999m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn spawn_policy_display_matches_config_spelling() {
        assert_eq!(SpawnPolicy::InProcess.to_string(), "in-process");
        assert_eq!(SpawnPolicy::default().to_string(), "new-process");
    }
}
