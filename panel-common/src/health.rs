//! Health severity reported in every heartbeat.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity the gateway shows next to a software or hardware entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// Everything is running normally.
    #[default]
    Ok,
    /// Degraded but still doing its job.
    Warning,
    /// Broken; the operator should look at it.
    Error,
}

impl Health {
    /// All severities for iteration.
    pub const ALL: [Health; 3] = [Health::Ok, Health::Warning, Health::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Ok => "ok",
            Health::Warning => "warning",
            Health::Error => "error",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of `ok`, `warning` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("health must be \"ok\", \"warning\" or \"error\", got \"{0}\"")]
pub struct ParseHealthError(pub String);

impl FromStr for Health {
    type Err = ParseHealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Health::Ok),
            "warning" => Ok(Health::Warning),
            "error" => Ok(Health::Error),
            other => Err(ParseHealthError(other.to_string())),
        }
    }
}
