//! Configuration loading tests

use seb_gate::config::{KeySource, LogFormat, ResponsePolicy, load_config_from_str};

const MINIMAL_CONFIG: &str = r#"
[gate]
whitelist_paths = ["wiki"]
"#;

const FULL_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 9000
public_base_url = "https://lms.example.com"

[gate]
whitelist_paths = ["wiki", "discussion", "courseware", "progress"]
blacklist_chapters = ["final-exam", "midterm"]
user_banning_enabled = false
permission_components = ["AlwaysAllowStaff", "CheckSEBHashBrowserExamKey"]
masquerade_aware = false
response_policy = "bare"

[gate.aliases]
"discussion.views" = "discussion"
"course_wiki.views" = "wiki"
"lms.djangoapps.teams" = "teams"

[keys]
browser_keys = ["bek-1", "bek-2"]
config_keys = ["ck-1"]
sources = ["course_configuration", "global_settings"]

[logging]
level = "debug"
format = "json"

[[catalog.courses]]
id = "course-v1:edX+DemoX+2024"
display_name = "Demo Course"

[[catalog.courses.chapters]]
id = "intro"
display_name = "Introduction"
blocks = ["block-v1:edX+DemoX+2024+type@vertical+block@intro-1"]

[[catalog.courses.chapters]]
id = "final-exam"
blocks = ["block-v1:edX+DemoX+2024+type@problem+block@q1"]

[catalog.courses.seb]
user_banning_enabled = true
browser_keys = ["course-bek"]
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.gate.whitelist_paths, vec!["wiki"]);
    assert!(config.gate.blacklist_chapters.is_empty());
    assert!(config.gate.user_banning_enabled);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.catalog.courses.is_empty());
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    // Server
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(
        config.server.public_base_url.as_deref(),
        Some("https://lms.example.com")
    );

    // Gate
    assert_eq!(config.gate.blacklist_chapters, vec!["final-exam", "midterm"]);
    assert!(!config.gate.user_banning_enabled);
    assert!(!config.gate.masquerade_aware);
    assert_eq!(config.gate.response_policy, ResponsePolicy::Bare);
    assert_eq!(
        config.gate.permission_components,
        vec!["AlwaysAllowStaff", "CheckSEBHashBrowserExamKey"]
    );
    assert_eq!(
        config
            .gate
            .aliases
            .get("lms.djangoapps.teams")
            .map(String::as_str),
        Some("teams")
    );

    // Keys
    assert_eq!(config.keys.browser_keys.len(), 2);
    assert_eq!(config.keys.browser_keys[0].expose_secret(), "bek-1");
    assert_eq!(
        config.keys.sources,
        vec![KeySource::CourseConfiguration, KeySource::GlobalSettings]
    );

    // Logging
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);

    // Catalog
    let course = &config.catalog.courses[0];
    assert_eq!(course.display_name, "Demo Course");
    assert_eq!(course.chapters.len(), 2);
    assert_eq!(course.chapters[1].id, "final-exam");
    let seb = course.seb.as_ref().unwrap();
    assert_eq!(seb.user_banning_enabled, Some(true));
    assert!(seb.blacklist_chapters.is_none());
}

#[test]
fn test_keys_are_redacted_in_debug() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();
    let debug = format!("{:?}", config.keys);
    assert!(!debug.contains("bek-1"));
    assert!(!debug.contains("ck-1"));
}

#[test]
fn test_invalid_response_policy() {
    let config_str = r#"
[gate]
response_policy = "fancy"
"#;

    let result = load_config_from_str(config_str);
    assert!(result.is_err());
}

#[test]
fn test_unknown_permission_component() {
    let config_str = r#"
[gate]
permission_components = ["CheckSEBKeysRequestHash", "AllowEveryoneOnFridays"]
"#;

    let err = load_config_from_str(config_str).unwrap_err();
    assert!(err.to_string().contains("AllowEveryoneOnFridays"));
}

#[test]
fn test_invalid_catalog_course_id() {
    let config_str = r#"
[[catalog.courses]]
id = "DemoX"
"#;

    let result = load_config_from_str(config_str);
    assert!(result.is_err());
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use seb_gate::config::load_config;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("seb-gate.toml");
    let config_content = r#"
[server]
port = 9000

[gate]
user_banning_enabled = true
"#;
    fs::write(&config_path, config_content).unwrap();

    unsafe {
        env::set_var("SEB_GATE__GATE__USER_BANNING_ENABLED", "false");
        env::set_var("SEB_GATE__SERVER__PORT", "9100");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert!(!config.gate.user_banning_enabled);
    assert_eq!(config.server.port, 9100);

    // Cleanup
    unsafe {
        env::remove_var("SEB_GATE__GATE__USER_BANNING_ENABLED");
        env::remove_var("SEB_GATE__SERVER__PORT");
    }
}

#[test]
#[serial_test::serial]
fn test_env_var_list_values() {
    use seb_gate::config::load_config;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("seb-gate.toml");
    fs::write(&config_path, "[gate]\nwhitelist_paths = [\"wiki\"]\n").unwrap();

    unsafe {
        env::set_var("SEB_GATE__GATE__BLACKLIST_CHAPTERS", "exam-1,exam-2");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.gate.whitelist_paths, vec!["wiki"]);
    assert_eq!(config.gate.blacklist_chapters, vec!["exam-1", "exam-2"]);

    unsafe {
        env::remove_var("SEB_GATE__GATE__BLACKLIST_CHAPTERS");
    }
}

#[test]
#[serial_test::serial]
fn test_missing_explicit_config_file() {
    use seb_gate::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_config(Some(missing.to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("not found"));
}
