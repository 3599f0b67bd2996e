//! Effective gate policy
//!
//! The global policy is compiled once from configuration at startup. A
//! per-course configuration record, when present, yields a course policy in
//! which every field the record sets replaces the global value.

use crate::config::{CourseSebConfig, GateConfig, KeysConfig};
use crate::error::ConfigError;
use crate::permissions::{KeyMaterial, PermissionRegistry, SharedComponent};
use std::collections::HashSet;
use std::fmt;

/// Settings the engine evaluates one request against
#[derive(Clone)]
pub struct GatePolicy {
    pub whitelist_paths: Vec<String>,
    pub blacklist_chapters: HashSet<String>,
    pub user_banning_enabled: bool,
    /// Resolved permission components, in evaluation order
    pub components: Vec<SharedComponent>,
    pub keys: KeyMaterial,
}

impl GatePolicy {
    /// Compile the global policy; unknown component names are an error
    pub fn from_config(
        gate: &GateConfig,
        keys: &KeysConfig,
        registry: &PermissionRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            whitelist_paths: gate.whitelist_paths.clone(),
            blacklist_chapters: gate.blacklist_chapters.iter().cloned().collect(),
            user_banning_enabled: gate.user_banning_enabled,
            components: registry.resolve(&gate.permission_components)?,
            keys: KeyMaterial::collect(keys, None),
        })
    }

    /// Policy with the given lists, banning enabled, and no components
    pub fn with_lists(whitelist: &[&str], blacklist: &[&str]) -> Self {
        Self {
            whitelist_paths: whitelist.iter().map(|s| s.to_string()).collect(),
            blacklist_chapters: blacklist.iter().map(|s| s.to_string()).collect(),
            user_banning_enabled: true,
            components: Vec::new(),
            keys: KeyMaterial::default(),
        }
    }

    /// Apply a per-course record on top of this policy
    pub fn overridden(
        &self,
        record: &CourseSebConfig,
        keys: &KeysConfig,
        registry: &PermissionRegistry,
    ) -> Self {
        Self {
            whitelist_paths: record
                .whitelist_paths
                .clone()
                .unwrap_or_else(|| self.whitelist_paths.clone()),
            blacklist_chapters: record
                .blacklist_chapters
                .as_ref()
                .map(|chapters| chapters.iter().cloned().collect())
                .unwrap_or_else(|| self.blacklist_chapters.clone()),
            user_banning_enabled: record
                .user_banning_enabled
                .unwrap_or(self.user_banning_enabled),
            components: record
                .permission_components
                .as_deref()
                .map(|names| registry.resolve_lenient(names))
                .unwrap_or_else(|| self.components.clone()),
            keys: KeyMaterial::collect(keys, Some(record)),
        }
    }

    pub fn whitelists(&self, name: &str) -> bool {
        self.whitelist_paths.iter().any(|path| path == name)
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name()).collect()
    }
}

impl fmt::Debug for GatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePolicy")
            .field("whitelist_paths", &self.whitelist_paths)
            .field("blacklist_chapters", &self.blacklist_chapters)
            .field("user_banning_enabled", &self.user_banning_enabled)
            .field("components", &self.component_names())
            .field("keys", &self.keys)
            .finish()
    }
}
