//! Registry entry a heartbeat reports as.

use panel_common::{Details, HardwareHeartbeat, SoftwareHeartbeat};
use serde_json::Value;

use crate::error::{Error, Result};

use super::HealthSnapshot;

/// A software or hardware entry on the gateway.
///
/// The entry must already exist; heartbeats never create it.
#[derive(Debug, Clone, PartialEq)]
pub enum BeaconTarget {
    Software { name: String },
    Hardware { name: String, config: Option<Details> },
}

impl BeaconTarget {
    pub fn software(name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        Ok(BeaconTarget::Software { name })
    }

    pub fn hardware(name: impl Into<String>, config: Option<Details>) -> Result<Self> {
        let name = validate_name(name.into())?;
        Ok(BeaconTarget::Hardware { name, config })
    }

    /// Build a target from the `kind` string used in configuration.
    pub fn from_kind(kind: &str, name: &str, config: Option<Details>) -> Result<Self> {
        match kind {
            "software" => {
                if config.is_some() {
                    return Err(Error::InvalidArgument(
                        "config is only sent for hardware entries".to_string(),
                    ));
                }
                Self::software(name)
            }
            "hardware" => Self::hardware(name, config),
            other => Err(Error::InvalidArgument(format!(
                "kind must be \"software\" or \"hardware\", got \"{}\"",
                other
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BeaconTarget::Software { name } | BeaconTarget::Hardware { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BeaconTarget::Software { .. } => "software",
            BeaconTarget::Hardware { .. } => "hardware",
        }
    }

    pub fn heartbeat_path(&self) -> String {
        format!("/{}/{}/heartbeat", self.kind(), self.name())
    }

    /// JSON body for one beat in the shape this kind of entry expects.
    pub fn payload(&self, snapshot: &HealthSnapshot) -> Result<Value> {
        let value = match self {
            BeaconTarget::Software { .. } => serde_json::to_value(SoftwareHeartbeat {
                health: snapshot.health,
                details: snapshot.details.clone(),
            }),
            BeaconTarget::Hardware { config, .. } => serde_json::to_value(HardwareHeartbeat {
                health: snapshot.health,
                config: config.clone(),
                details: snapshot.details.clone(),
            }),
        };
        value.map_err(|e| Error::InvalidArgument(format!("Unserializable heartbeat: {}", e)))
    }
}

impl std::fmt::Display for BeaconTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}

fn validate_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument("entry name must not be empty".to_string()));
    }
    if name.contains('/') || name.contains(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!(
            "entry name must not contain '/' or whitespace: \"{}\"",
            name
        )));
    }
    Ok(name)
}
