//! SEB key material
//!
//! Browser exam keys and config keys gathered from the configured key
//! sources for one course.

use crate::config::{CourseSebConfig, KeySource, KeysConfig};
use crate::util::SecretString;

/// Keys a request hash may be computed with
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    pub browser_keys: Vec<SecretString>,
    pub config_keys: Vec<SecretString>,
}

impl KeyMaterial {
    pub fn new(browser_keys: Vec<SecretString>, config_keys: Vec<SecretString>) -> Self {
        Self {
            browser_keys,
            config_keys,
        }
    }

    /// Combine keys from every configured source, in source order
    pub fn collect(global: &KeysConfig, course: Option<&CourseSebConfig>) -> Self {
        let mut material = Self::default();
        for source in &global.sources {
            match source {
                KeySource::GlobalSettings => {
                    material.extend(&global.browser_keys, &global.config_keys);
                }
                KeySource::CourseConfiguration => {
                    if let Some(record) = course {
                        material.extend(
                            record.browser_keys.as_deref().unwrap_or_default(),
                            record.config_keys.as_deref().unwrap_or_default(),
                        );
                    }
                }
            }
        }
        material
    }

    fn extend(&mut self, browser_keys: &[SecretString], config_keys: &[SecretString]) {
        self.browser_keys
            .extend(browser_keys.iter().filter(|k| !k.is_empty()).cloned());
        self.config_keys
            .extend(config_keys.iter().filter(|k| !k.is_empty()).cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.browser_keys.is_empty() && self.config_keys.is_empty()
    }
}
