use crate::HarnessError;
use crate::escalation::EscalationPolicy;
use crate::plugins::Registration;
use crate::source::DeliveryMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable fuzz targets read their config path from.
pub const CONFIG_ENV: &str = "MEDIAFUZZ_CONFIG";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub registration: Registration,
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
    #[serde(default)]
    pub typefind_plugins: Option<Vec<String>>,
    #[serde(default)]
    pub discoverer_plugins: Option<Vec<String>>,
    #[serde(default)]
    pub escalation: EscalationPolicy,
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::from_build(),
            registration: Registration::from_build(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            typefind_plugins: None,
            discoverer_plugins: None,
            escalation: EscalationPolicy::default(),
        }
    }
}

impl HarnessConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Build defaults, or the `[harness]` table of the file named by
    /// `MEDIAFUZZ_CONFIG`.
    pub fn from_env() -> Result<Self, HarnessError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => MediafuzzConfig::load_from_file(Path::new(&path))
                .map(|config| config.harness)
                .map_err(|e| HarnessError::Config(format!("{e:#}"))),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigInputDelivery {
    #[default]
    StdIn,
    File {
        template: String,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TriageSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub input_delivery: ConfigInputDelivery,
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Leaves room for the discoverer's own timeout before a replay counts as a
/// hang.
fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            input_delivery: ConfigInputDelivery::default(),
            artifact_dir: None,
            working_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MediafuzzConfig {
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub triage: TriageSettings,
}

impl MediafuzzConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: MediafuzzConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.harness.discovery_timeout_secs == 0 {
            anyhow::bail!("harness.discovery-timeout-secs must be greater than zero");
        }
        if self.triage.timeout_ms == 0 {
            anyhow::bail!("triage.timeout-ms must be greater than zero");
        }
        if let ConfigInputDelivery::File { template } = &self.triage.input_delivery {
            if !template.contains("{}") {
                anyhow::bail!("triage.input-delivery file template {template:?} has no '{{}}'");
            }
        }
        Ok(())
    }
}
