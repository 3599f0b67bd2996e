//! Secret string type for SEB key material.
//!
//! Browser exam keys and config keys are shared secrets between the exam
//! browser configuration and this gate; they must never end up in logs.

use serde::Deserialize;
use std::fmt;

/// A wrapper for secrets that prevents accidental logging.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is only reachable
/// through [`SecretString::expose_secret`].
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret from any string-like value.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Explicitly expose the secret value.
    ///
    /// Only the request-hash components should need this.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty (blank keys are skipped by components)
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // Best-effort clearing; copies made elsewhere are not covered
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redacted() {
        let key = SecretString::new("browser-exam-key");
        assert_eq!(format!("{:?}", key), "[REDACTED]");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_redacted_inside_collections() {
        let keys = vec![SecretString::new("k1"), SecretString::new("k2")];
        let debug_output = format!("{:?}", keys);
        assert!(!debug_output.contains("k1"));
        assert_eq!(debug_output, "[[REDACTED], [REDACTED]]");
    }

    #[test]
    fn test_expose_and_blank() {
        let key = SecretString::new("abc");
        assert_eq!(key.expose_secret(), "abc");
        assert!(!key.is_empty());
        assert!(SecretString::new("  ").is_empty());
    }

    #[test]
    fn test_deserialize_list() {
        let keys: Vec<SecretString> = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].expose_secret(), "b");
    }
}
