//! Persistent settings for the layout engine.

use crate::error::{LayoutError, Result};
use crate::simulation::{SimulationOptions, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Layout settings, persisted as JSON in the platform config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Rendered node radius in pixels, used for the boundary margin
    #[serde(default = "default_node_radius")]
    pub node_radius: f32,
    /// Extra space kept between a node and the canvas edge
    #[serde(default = "default_padding")]
    pub padding: f32,
    /// Node attribute holding the persisted position
    #[serde(default = "default_layout_attribute")]
    pub layout_attribute: String,
    #[serde(default)]
    pub simulation: SimulationOptions,
    /// Worker pacing; 0 runs ticks back to back
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Simulation extent used before the canvas is measured
    #[serde(default = "default_extent")]
    pub default_extent: f32,
}

fn default_node_radius() -> f32 {
    20.0
}

fn default_padding() -> f32 {
    4.0
}

fn default_layout_attribute() -> String {
    "layout".to_string()
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_extent() -> f32 {
    1000.0
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            node_radius: default_node_radius(),
            padding: default_padding(),
            layout_attribute: default_layout_attribute(),
            simulation: SimulationOptions::default(),
            tick_interval_ms: default_tick_interval_ms(),
            default_extent: default_extent(),
        }
    }
}

impl LayoutSettings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("sociogram-layout");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, returning defaults if the file doesn't exist or is invalid
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            tracing::warn!("Could not determine config directory, settings not saved");
            return;
        };

        match self.save_to(&path) {
            Ok(()) => tracing::info!("Saved settings to {:?}", path),
            Err(e) => tracing::warn!("Failed to save settings: {}", e),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| LayoutError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LayoutError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| LayoutError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: LayoutSettings =
            serde_json::from_str(r#"{ "node_radius": 12.0, "simulation": { "charge": -60.0 } }"#).unwrap();
        assert_eq!(settings.node_radius, 12.0);
        assert_eq!(settings.layout_attribute, "layout");
        assert_eq!(settings.simulation.charge, -60.0);
        assert_eq!(settings.simulation.velocity_decay, 0.4);
        assert_eq!(settings.worker_config().tick_interval, Duration::from_millis(16));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = LayoutSettings {
            padding: 8.0,
            layout_attribute: "sociogram".to_string(),
            tick_interval_ms: 0,
            ..LayoutSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(LayoutSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(LayoutSettings::load_from(&path), Err(LayoutError::Json { .. })));
        assert!(matches!(
            LayoutSettings::load_from(&dir.path().join("missing.json")),
            Err(LayoutError::Io { .. })
        ));
    }
}
