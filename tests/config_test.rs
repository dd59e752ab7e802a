//! Integration tests for configuration loading

use ticket_desk::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[api]
base_url = "https://tickets.example.org/conf"
timeout_ms = 2500

[assets]
avatar_prefix = "/static/avatars"
qr_prefix = "/static/qr"
download_dir = "/tmp/tickets"

[registration]
max_avatar_bytes = 250000

[event]
name = "RustFest"
location = "Zurich"
date = "2026-09-12"

[dashboard]
refresh_secs = 5
log_file = "dash.log"

[mock]
bind_address = "0.0.0.0"
port = 5050
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.base_url(), "https://tickets.example.org/conf");
    assert_eq!(config.timeout_ms(), 2500);
    assert_eq!(config.avatar_prefix(), "/static/avatars");
    assert_eq!(config.qr_prefix(), "/static/qr");
    assert_eq!(config.download_dir(), "/tmp/tickets");
    assert_eq!(config.max_avatar_bytes(), 250_000);
    assert_eq!(config.event().name, "RustFest");
    assert_eq!(config.event().location, "Zurich");
    assert_eq!(config.refresh_secs(), 5);
    assert_eq!(config.dashboard_log_file(), "dash.log");
    assert_eq!(config.mock_bind_address(), "0.0.0.0");
    assert_eq!(config.mock_port(), 5050);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[api\nbase_url = ").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.base_url(), "http://localhost:5000");
    assert_eq!(config.timeout_ms(), 10_000);
    assert_eq!(config.max_avatar_bytes(), 500_000);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_shipped_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/ticket-desk.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.base_url(), "http://localhost:5000");
    assert_eq!(config.qr_prefix(), "/qr_codes");
    assert_eq!(config.event().date, "2025-08-23");
}

#[test]
fn test_partial_event_section_keeps_rest_of_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[api]
base_url = "http://registrar.internal:8080"
timeout_ms = 3000

[event]
name = "RustFest"
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::load_from_path(&temp_file.path().display().to_string());
    assert_eq!(config.base_url(), "http://registrar.internal:8080");
    assert_eq!(config.timeout_ms(), 3000);
    assert_eq!(config.event().name, "RustFest");
    assert_eq!(config.event().location, "Austin, TX");
    assert_eq!(config.event().date, "2025-08-23");
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}
