use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Configuration {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Seeded into the wards table on first start, keyed by ward number
    #[serde(default)]
    pub wards: BTreeMap<String, WardSeed>,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let cfg: Self = toml::from_str(&config)
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        Ok(cfg)
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RecorderConfig {
    /// Compare-and-swap attempts before an aggregate write gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_top_performers")]
    pub top_performers: usize,
    #[serde(default = "default_daily_window_days")]
    pub daily_window_days: u32,
    #[serde(default = "default_recent_collections")]
    pub recent_collections: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            top_performers: default_top_performers(),
            daily_window_days: default_daily_window_days(),
            recent_collections: default_recent_collections(),
        }
    }
}

fn default_top_performers() -> usize {
    10
}

fn default_daily_window_days() -> u32 {
    7
}

fn default_recent_collections() -> u64 {
    5
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct WardSeed {
    pub ward_name: String,
    #[serde(default)]
    pub supervisor_name: Option<String>,
    #[serde(default)]
    pub supervisor_contact: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_configuration_gets_defaults() {
        let cfg: Configuration = toml::from_str("[database]\npath = \"/tmp\"\n").unwrap();
        assert_eq!(cfg.database.path, "/tmp");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.recorder.max_attempts, 3);
        assert_eq!(cfg.dashboard.top_performers, 10);
        assert_eq!(cfg.dashboard.daily_window_days, 7);
        assert_eq!(cfg.dashboard.recent_collections, 5);
        assert!(cfg.wards.is_empty());
    }

    #[test]
    fn loads_wards_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[database]
path = "data"

[recorder]
max_attempts = 7

[wards.014]
ward_name = "Harbour"
supervisor_name = "Leela"
"#
        )
        .unwrap();

        let cfg = Configuration::load(file.path()).unwrap();
        assert_eq!(cfg.recorder.max_attempts, 7);
        let ward = cfg.wards.get("014").unwrap();
        assert_eq!(ward.ward_name, "Harbour");
        assert_eq!(ward.supervisor_name.as_deref(), Some("Leela"));
        assert_eq!(ward.supervisor_contact, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Configuration::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read configuration"));
    }
}
