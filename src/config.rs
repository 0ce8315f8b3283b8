use crate::ik::IkParams;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Pipeline tunables. All fields default individually so a settings file may
/// override only what it cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Blend-weight sum below which the blended pose falls back to the rest
    /// pose.
    #[serde(default = "PipelineSettings::default_blend_threshold")]
    pub blend_threshold: f32,
    #[serde(default = "PipelineSettings::default_ik_weight")]
    pub ik_weight: f32,
    #[serde(default = "PipelineSettings::default_ik_soften")]
    pub ik_soften: f32,
    #[serde(default)]
    pub ik_twist_angle: f32,
}

impl PipelineSettings {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let text = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read pipeline settings {}", path_ref.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse pipeline settings {}", path_ref.display()))
    }

    pub fn ik_params(&self) -> IkParams {
        IkParams { weight: self.ik_weight, soften: self.ik_soften, twist_angle: self.ik_twist_angle }
    }

    fn default_blend_threshold() -> f32 {
        0.1
    }

    fn default_ik_weight() -> f32 {
        1.0
    }

    fn default_ik_soften() -> f32 {
        1.0
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            blend_threshold: Self::default_blend_threshold(),
            ik_weight: Self::default_ik_weight(),
            ik_soften: Self::default_ik_soften(),
            ik_twist_angle: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: PipelineSettings = serde_json::from_str(r#"{ "ik_weight": 0.5 }"#).unwrap();
        assert_eq!(settings.ik_weight, 0.5);
        assert_eq!(settings.blend_threshold, 0.1);
        assert_eq!(settings.ik_soften, 1.0);
        assert_eq!(settings.ik_twist_angle, 0.0);
    }
}
