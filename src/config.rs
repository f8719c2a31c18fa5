use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of a [`Pipeline`](crate::Pipeline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name used as prefix in log lines
    pub name: String,
    /// Volume restored by every stop, 0.0 to 1.0
    pub default_volume: f32,
    /// Playback rate restored by every stop
    pub default_playback_rate: f32,
    /// Rate the demo applies once the chain is started
    pub initial_playback_rate: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            name: "pipeline".to_string(),
            default_volume: 1.0,
            default_playback_rate: 0.0,
            initial_playback_rate: 1.0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let conf: PipelineConfig =
            serde_json::from_str(json).context("Failed to parse pipeline config")?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            bail!("default_volume must be within 0.0..=1.0, got {}", self.default_volume);
        }
        if !(self.default_playback_rate >= 0.0) {
            bail!(
                "default_playback_rate must not be negative, got {}",
                self.default_playback_rate
            );
        }
        if !(self.initial_playback_rate >= 0.0) {
            bail!(
                "initial_playback_rate must not be negative, got {}",
                self.initial_playback_rate
            );
        }
        Ok(())
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let conf = PipelineConfig::from_json(r#"{ "default_volume": 0.5 }"#).unwrap();
        assert_eq!(conf.default_volume, 0.5);
        assert_eq!(conf.default_playback_rate, 0.0);
        assert_eq!(conf.name, "pipeline");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_json(r#"{ "default_volume": 1.5 }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "default_playback_rate": -1.0 }"#).is_err());
        assert!(PipelineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_roundtrip_default() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), PipelineConfig::default());
    }
}
