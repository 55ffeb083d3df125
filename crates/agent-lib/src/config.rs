//! Agent configuration
//!
//! Loaded once at startup from a JSON file, with `MEMLOG_*` environment
//! variables layered on top (e.g. `MEMLOG_SCHEDULE=250ms`).

use crate::error::{AgentError, Result};
use crate::schedule::{Schedule, Scheduler};
use serde::Deserialize;
use std::path::Path;

/// Config file read when the embedder does not name one
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MEMLOG";

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// File the JSON sample array is written to
    #[serde(alias = "output_path_json")]
    pub output_path: String,

    /// Emit lifecycle diagnostics to the log channel
    #[serde(default, alias = "stdout_messages")]
    pub emit_diagnostics: bool,

    /// Fixed interval literal or cron expression
    #[serde(alias = "cron_expr")]
    pub schedule: String,

    /// Divides every computed delay to sample more finely than the schedule
    #[serde(default = "default_sample_divisor", alias = "timeout_divider")]
    pub sample_divisor: u32,
}

fn default_sample_divisor() -> u32 {
    1
}

impl AgentConfig {
    /// Load configuration from a JSON file and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AgentError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from JSON text, without environment overrides
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check every field and build the scheduler
    pub fn validate(&self) -> Result<Scheduler> {
        if self.output_path.trim().is_empty() {
            return Err(AgentError::Config("output_path must not be empty".to_string()));
        }
        let schedule = Schedule::parse(&self.schedule)?;
        Ok(Scheduler::new(schedule, self.sample_divisor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = AgentConfig::from_json_str(
            r#"{
                "output_path": "/tmp/memlog.json",
                "emit_diagnostics": true,
                "schedule": "*/5 * * * * *",
                "sample_divisor": 5
            }"#,
        )
        .unwrap();

        assert_eq!(config.output_path, "/tmp/memlog.json");
        assert!(config.emit_diagnostics);
        assert_eq!(config.sample_divisor, 5);
        assert_eq!(config.validate().unwrap().divisor(), 5);
    }

    #[test]
    fn test_defaults() {
        let config =
            AgentConfig::from_json_str(r#"{"output_path": "out.json", "schedule": "1s"}"#)
                .unwrap();

        assert!(!config.emit_diagnostics);
        assert_eq!(config.sample_divisor, 1);
    }

    #[test]
    fn test_legacy_field_names() {
        let config = AgentConfig::from_json_str(
            r#"{
                "output_path_json": "memlog.json",
                "stdout_messages": true,
                "cron_expr": "* * * * * *",
                "timeout_divider": 4
            }"#,
        )
        .unwrap();

        assert_eq!(config.output_path, "memlog.json");
        assert!(config.emit_diagnostics);
        assert_eq!(config.schedule, "* * * * * *");
        assert_eq!(config.sample_divisor, 4);
    }

    #[test]
    fn test_missing_required_field() {
        let result = AgentConfig::from_json_str(r#"{"schedule": "1s"}"#);
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = AgentConfig::from_json_str(
            r#"{"output_path": "a", "schedule": "1s", "verbose": true}"#,
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_negative_divisor_rejected() {
        let result = AgentConfig::from_json_str(
            r#"{"output_path": "a", "schedule": "1s", "sample_divisor": -2}"#,
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_divisor() {
        let config = AgentConfig {
            output_path: "a".to_string(),
            emit_diagnostics: false,
            schedule: "1s".to_string(),
            sample_divisor: 0,
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_output_path() {
        let config = AgentConfig {
            output_path: "  ".to_string(),
            emit_diagnostics: false,
            schedule: "1s".to_string(),
            sample_divisor: 1,
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_malformed_schedule() {
        let config = AgentConfig {
            output_path: "a".to_string(),
            emit_diagnostics: false,
            schedule: "*/0 * * * * *".to_string(),
            sample_divisor: 1,
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"output_path": "x.json", "schedule": "2s"}"#).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.schedule, "2s");
    }

    #[test]
    fn test_load_missing_file() {
        let result = AgentConfig::load("/nonexistent/memlog/config.json");
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
