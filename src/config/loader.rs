//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (SEB_GATE_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use crate::gate::CourseKey;
use crate::permissions::PermissionRegistry;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "seb-gate.toml",
    ".seb-gate.toml",
    "~/.config/seb-gate/config.toml",
    "/etc/seb-gate/config.toml",
];

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SEB_GATE";

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        let expanded = shellexpand::tilde(path);
        if !Path::new(expanded.as_ref()).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
    } else {
        // First existing default path wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g. SEB_GATE__SERVER__PORT, SEB_GATE__GATE__USER_BANNING_ENABLED
    // Double underscore (__) maps to nested keys (gate.user_banning_enabled)
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("gate.whitelist_paths")
            .with_list_parse_key("gate.blacklist_chapters")
            .with_list_parse_key("gate.permission_components")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if let Some(url) = &config.server.public_base_url
        && !url.starts_with("http://")
        && !url.starts_with("https://")
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "server.public_base_url must start with http:// or https://, got: {}",
                url
            ),
        });
    }

    let registry = PermissionRegistry::builtin();
    validate_components(&registry, &config.gate.permission_components, "gate")?;

    for (prefix, alias) in &config.gate.aliases {
        if prefix.is_empty() || alias.is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("gate.aliases: empty entry '{}' = '{}'", prefix, alias),
            });
        }
    }

    for course in &config.catalog.courses {
        CourseKey::parse(&course.id).map_err(|e| ConfigError::Invalid {
            message: format!("catalog.courses: {}", e),
        })?;

        if let Some(names) = course.seb.as_ref().and_then(|s| s.permission_components.as_ref()) {
            validate_components(&registry, names, &format!("catalog.courses.{}.seb", course.id))?;
        }
    }

    Ok(())
}

/// Validate that every configured component is registered
fn validate_components(
    registry: &PermissionRegistry,
    names: &[String],
    field_path: &str,
) -> Result<(), ConfigError> {
    for name in names {
        if !registry.contains(name) {
            return Err(ConfigError::UnknownComponent {
                name: format!("{} (in {}.permission_components)", name, field_path),
            });
        }
    }
    Ok(())
}
