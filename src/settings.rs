//! Sync Settings
//!
//! Options read once per session. Every field has a default, so a settings
//! file only needs to name what it changes.
//!
//! ```rust,ignore
//! let settings = SyncSettings::from_json_str(r#"{ "export_lights": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Name of the root actor in the target scene.
    pub scene_name: String,
    pub export_lights: bool,
    pub export_cameras: bool,
    pub export_hotlinks: bool,
    /// Attach id/type/layer metadata to element actors.
    pub export_metadata: bool,
    /// Process every surviving node, not only modified ones.
    pub always_process: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            scene_name: "Scene".to_string(),
            export_lights: true,
            export_cameras: true,
            export_hotlinks: true,
            export_metadata: true,
            always_process: false,
        }
    }
}

impl SyncSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = SyncSettings::from_json_str(r#"{ "export_lights": false }"#).unwrap();
        assert!(!settings.export_lights);
        assert!(settings.export_cameras);
        assert_eq!(settings.scene_name, "Scene");
    }

    #[test]
    fn test_json_round_trip() {
        let settings = SyncSettings {
            scene_name: "Tower".to_string(),
            always_process: true,
            ..Default::default()
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(SyncSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(SyncSettings::from_json_str("{ not json").is_err());
    }
}
