use crate::core::{
    DialogueConfig, EmotionConfig, PolicyTable, RankingSettings, RuleConfig, ScoringConfig, Vocabulary,
    VocabularyError,
};
use crate::services::catalog::FieldMapping;
use crate::services::sessions::SessionSettings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub emotion: EmotionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub policy: PolicyTable,
    #[serde(default)]
    pub ranking: RankingSettings,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_path")]
    pub path: String,
    /// Periodic reload interval; 0 disables the refresh task
    #[serde(default)]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub mapping: FieldMapping,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            refresh_interval_secs: 0,
            mapping: FieldMapping::default(),
        }
    }
}

fn default_catalog_path() -> String { "data/properties.csv".to_string() }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionSettings {
    /// Gazetteer and amenity vocabulary file; the built-in tables are used when unset
    pub vocabulary_path: Option<String>,
    #[serde(default)]
    pub rules: RuleConfig,
}

impl ExtractionSettings {
    pub fn vocabulary(&self) -> Result<Vocabulary, VocabularyError> {
        match &self.vocabulary_path {
            Some(path) => Vocabulary::from_file(path),
            None => Ok(Vocabulary::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SPACE__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SPACE__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        settings = apply_env_overrides(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject tables the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.scoring.weights;
        let all = [weights.location, weights.sqft, weights.budget, weights.amenities, weights.culture];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("scoring weights must be finite and non-negative"));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(invalid("at least one scoring weight must be positive"));
        }

        let tolerances = &self.scoring.tolerances;
        if !(tolerances.budget_overage >= 0.0 && tolerances.sqft_range >= 0.0) {
            return Err(invalid("tolerances must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.scoring.region_credit) {
            return Err(invalid("scoring.region_credit must be within [0, 1]"));
        }
        if self.policy.min_tolerance > self.policy.max_tolerance {
            return Err(invalid("policy.min_tolerance exceeds policy.max_tolerance"));
        }
        if self.policy.style_hints.iter().any(|h| !(0.0..=1.0).contains(&h.threshold)) {
            return Err(invalid("policy.style_hints thresholds must be within [0, 1]"));
        }
        if self.sessions.max_sessions == 0 {
            return Err(invalid("sessions.max_sessions must be at least 1"));
        }

        let ranges = &self.emotion.cue_ranges;
        for (name, range) in [
            ("pitch_variance", &ranges.pitch_variance),
            ("energy", &ranges.energy),
            ("speech_rate", &ranges.speech_rate),
            ("pause_ratio", &ranges.pause_ratio),
        ] {
            if !range.is_valid() {
                return Err(invalid(&format!("emotion.cue_ranges.{} must have low < high", name)));
            }
        }

        if self.ranking.default_top_n == 0 || self.ranking.max_top_n == 0 {
            return Err(invalid("ranking top-N limits must be at least 1"));
        }
        let rules = &self.extraction.rules;
        if rules.sqft_per_person_min == 0 || rules.sqft_per_person_min > rules.sqft_per_person_max {
            return Err(invalid("extraction.rules sqft-per-person bounds are inverted or zero"));
        }

        self.catalog.mapping.validate().map_err(|e| invalid(&e.to_string()))
    }
}

fn environment() -> Environment {
    Environment::with_prefix("SPACE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}

/// Well-known environment variables that override config values
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(path) = env::var("CATALOG_PATH") {
        builder = builder.set_override("catalog.path", path)?;
    }
    if let Ok(path) = env::var("VOCABULARY_PATH") {
        builder = builder.set_override("extraction.vocabulary_path", path)?;
    }

    builder.build()
}
