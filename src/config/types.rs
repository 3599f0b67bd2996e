//! Configuration types for seb-gate
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables. Everything here is read once at
//! startup and shared immutably afterwards.

use crate::util::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default permission components, evaluated in this order
pub const DEFAULT_PERMISSION_COMPONENTS: &[&str] = &["AlwaysAllowStaff", "CheckSEBKeysRequestHash"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Decision engine settings
    pub gate: GateConfig,

    /// Global SEB key material
    pub keys: KeysConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Course catalog served by the demo host
    pub catalog: CatalogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Public base URL (scheme + authority) browsers use to reach the
    /// server. SEB hashes are computed over the URL the browser sees, so
    /// this must be set when running behind a proxy.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18400,
            public_base_url: None,
        }
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Aliases, the `courseware` xblock flag, and URL-name prefixes exempted
    /// from the default deny
    pub whitelist_paths: Vec<String>,

    /// Chapter ids denied regardless of the whitelist
    pub blacklist_chapters: Vec<String>,

    /// Ban users on denial and deny banned users
    pub user_banning_enabled: bool,

    /// Permission components, in evaluation order
    pub permission_components: Vec<String>,

    /// Feed session masquerade into components and let the masquerade view through
    pub masquerade_aware: bool,

    /// Shape of denial responses
    pub response_policy: ResponsePolicy,

    /// Handler module prefix → whitelist alias
    pub aliases: BTreeMap<String, String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            whitelist_paths: Vec::new(),
            blacklist_chapters: Vec::new(),
            user_banning_enabled: true,
            permission_components: DEFAULT_PERMISSION_COMPONENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            masquerade_aware: true,
            response_policy: ResponsePolicy::default(),
            aliases: default_aliases(),
        }
    }
}

/// Built-in module prefix → alias table
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("discussion.views", "discussion"),
        ("course_wiki.views", "wiki"),
        ("openedx.features.course_experience", "course-outline"),
    ]
    .into_iter()
    .map(|(prefix, alias)| (prefix.to_string(), alias.to_string()))
    .collect()
}

/// How denial responses are shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePolicy {
    /// Courseware denials keep the index page chrome; other denials are
    /// wrapped in the theme chrome. Always 403.
    #[default]
    Themed,
    /// Every denial is a 403 with a bare HTML body
    Bare,
}

/// Where SEB key material comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// `[keys]` section of this configuration
    GlobalSettings,
    /// Per-course configuration record
    CourseConfiguration,
}

/// Global SEB key material
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Browser exam keys
    pub browser_keys: Vec<SecretString>,

    /// Configuration keys
    pub config_keys: Vec<SecretString>,

    /// Sources consulted for keys, in order
    pub sources: Vec<KeySource>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            browser_keys: Vec::new(),
            config_keys: Vec::new(),
            sources: vec![KeySource::GlobalSettings, KeySource::CourseConfiguration],
        }
    }
}

/// Per-course SEB configuration record.
///
/// Every field that is set overrides the global value for that course.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseSebConfig {
    pub permission_components: Option<Vec<String>>,
    pub browser_keys: Option<Vec<SecretString>>,
    pub config_keys: Option<Vec<SecretString>>,
    pub user_banning_enabled: Option<bool>,
    pub blacklist_chapters: Option<Vec<String>>,
    pub whitelist_paths: Option<Vec<String>>,
}

/// Static course catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub courses: Vec<CourseEntry>,
}

/// One course in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CourseEntry {
    /// Course key string
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub chapters: Vec<ChapterEntry>,

    /// Per-course SEB overrides
    #[serde(default)]
    pub seb: Option<CourseSebConfig>,
}

/// One chapter of a catalog course
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterEntry {
    /// Chapter url name, as it appears in courseware routes
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    /// Usage ids of the blocks under this chapter
    #[serde(default)]
    pub blocks: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
