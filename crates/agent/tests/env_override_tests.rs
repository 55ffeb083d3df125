//! Environment overrides for the agent configuration
//!
//! Kept in its own test binary: environment variables are process-wide and
//! would leak into config loads made by other tests.

use memlog_lib::config::AgentConfig;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"output_path": "memlog.json", "schedule": "1s", "sample_divisor": 1}"#,
    )
    .unwrap();

    std::env::set_var("MEMLOG_SCHEDULE", "250ms");
    std::env::set_var("MEMLOG_SAMPLE_DIVISOR", "5");
    let loaded = AgentConfig::load(&path);
    std::env::remove_var("MEMLOG_SCHEDULE");
    std::env::remove_var("MEMLOG_SAMPLE_DIVISOR");

    let config = loaded.unwrap();
    assert_eq!(config.schedule, "250ms");
    assert_eq!(config.sample_divisor, 5);
    assert_eq!(
        config.validate().unwrap().next_delay(),
        Duration::from_millis(50)
    );
}
