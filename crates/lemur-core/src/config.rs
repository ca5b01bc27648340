use crate::error::{LemurError, Result};
use crate::member::Member;
use crate::types::State;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "chaos-lemur.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DirectorConfig
// ---------------------------------------------------------------------------

/// Connection settings for the deployment director that enumerates VMs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectorConfig {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Accept self-signed director certificates.
    #[serde(default)]
    pub skip_ssl_validation: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// InfrastructureConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InfrastructureConfig {
    /// Static roster; destruction is only logged.
    Simple {
        #[serde(default)]
        members: Vec<Member>,
    },
    OpenStack {
        identity_endpoint: String,
        tenant: String,
        username: String,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        InfrastructureConfig::Simple {
            members: Vec::new(),
        }
    }
}

impl InfrastructureConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            InfrastructureConfig::Simple { .. } => "simple",
            InfrastructureConfig::OpenStack { .. } => "open_stack",
        }
    }
}

// ---------------------------------------------------------------------------
// ReporterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReporterConfig {
    #[default]
    Log,
    DataDog {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app_key: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default = "default_datadog_url")]
        base_url: String,
    },
}

fn default_datadog_url() -> String {
    "https://api.datadoghq.com".to_string()
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_probability")]
    pub default_probability: f64,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Per-job or per-deployment probability overrides.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub probabilities: HashMap<String, f64>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub state: State,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<DirectorConfig>,
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
}

fn default_schedule() -> String {
    "0 0 * * * *".to_string()
}

fn default_probability() -> f64 {
    0.2
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            default_probability: default_probability(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            probabilities: HashMap::new(),
            dry_run: false,
            state: State::Started,
            max_concurrency: default_max_concurrency(),
            director: None,
            infrastructure: InfrastructureConfig::default(),
            reporter: ReporterConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LemurError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Parse the cron schedule (seconds-first, six or seven fields).
    pub fn schedule(&self) -> Result<cron::Schedule> {
        cron::Schedule::from_str(&self.schedule).map_err(|e| LemurError::InvalidSchedule {
            expression: self.schedule.clone(),
            reason: e.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = self.schedule() {
            warnings.push(ConfigWarning::error(e.to_string()));
        }

        if !(0.0..=1.0).contains(&self.default_probability) {
            warnings.push(ConfigWarning::error(format!(
                "default_probability {} is outside [0, 1]",
                self.default_probability
            )));
        }

        let mut overrides: Vec<_> = self.probabilities.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));
        for (name, p) in overrides {
            if !(0.0..=1.0).contains(p) {
                warnings.push(ConfigWarning::warning(format!(
                    "probability {p} for '{name}' is outside [0, 1]"
                )));
            }
        }

        for name in &self.whitelist {
            if self
                .blacklist
                .iter()
                .any(|b| b.eq_ignore_ascii_case(name))
            {
                warnings.push(ConfigWarning::warning(format!(
                    "'{name}' is both whitelisted and blacklisted; the blacklist wins"
                )));
            }
        }

        if self.max_concurrency == 0 {
            warnings.push(ConfigWarning::error("max_concurrency must be at least 1"));
        }

        match &self.infrastructure {
            InfrastructureConfig::Simple { members } => {
                if members.is_empty() {
                    warnings.push(ConfigWarning::warning(
                        "simple infrastructure has no members; runs will destroy nothing",
                    ));
                }
            }
            InfrastructureConfig::OpenStack { .. } => {
                if self.director.is_none() {
                    warnings.push(ConfigWarning::error(
                        "open_stack infrastructure requires a director to enumerate members",
                    ));
                }
            }
        }

        if let ReporterConfig::DataDog { api_key, .. } = &self.reporter {
            if api_key.trim().is_empty() {
                warnings.push(ConfigWarning::error("data_dog reporter has an empty api_key"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
