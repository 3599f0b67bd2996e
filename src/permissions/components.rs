//! Built-in permission components

use crate::error::PermissionError;
use crate::gate::types::MasqueradeRole;
use crate::permissions::{
    ComponentRegistration, PermissionComponent, PermissionInput, SharedComponent,
};
use crate::util::SecretString;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};

/// Header carrying SHA-256(url + browser exam key)
pub const REQUEST_HASH_HEADER: &str = "x-safeexambrowser-requesthash";

/// Header carrying SHA-256(url + config key)
pub const CONFIG_KEY_HASH_HEADER: &str = "x-safeexambrowser-configkeyhash";

fn build<T: PermissionComponent + Default + 'static>() -> SharedComponent {
    Arc::new(T::default())
}

/// Lowercase hex SHA-256 of `url` immediately followed by `key`
pub fn request_hash(url: &str, key: &str) -> String {
    let digest = Sha256::new()
        .chain_update(url.as_bytes())
        .chain_update(key.as_bytes())
        .finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn header_matches_any(
    component: &'static str,
    header: &str,
    keys: &[SecretString],
    input: &PermissionInput<'_>,
) -> Result<bool, PermissionError> {
    let Some(value) = input.request.headers.get(header) else {
        return Ok(false);
    };
    let value = value
        .to_str()
        .map_err(|_| PermissionError::malformed_header(component, header))?
        .trim()
        .to_ascii_lowercase();

    // Every key is tried so the timing does not reveal which one matched
    let matched = keys.iter().fold(Choice::from(0), |acc, key| {
        let expected = request_hash(&input.request.absolute_url, key.expose_secret());
        acc | digest_eq(&expected, &value)
    });
    Ok(matched.into())
}

/// Constant-time comparison of two lowercase hex digests
fn digest_eq(expected: &str, presented: &str) -> Choice {
    expected.as_bytes().ct_eq(presented.as_bytes())
}

/// Staff always pass, unless previewing the course as a student
#[derive(Debug, Default)]
pub struct AlwaysAllowStaff;

impl AlwaysAllowStaff {
    pub const NAME: &'static str = "AlwaysAllowStaff";
}

impl PermissionComponent for AlwaysAllowStaff {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        if input
            .masquerade
            .is_some_and(|m| m.role == MasqueradeRole::Student)
        {
            return Ok(false);
        }
        Ok(input.request.is_staff())
    }
}

/// Unconditionally satisfied
#[derive(Debug, Default)]
pub struct AlwaysGrantAccess;

impl AlwaysGrantAccess {
    pub const NAME: &'static str = "AlwaysGrantAccess";
}

impl PermissionComponent for AlwaysGrantAccess {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, _input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        Ok(true)
    }
}

/// Never satisfied
#[derive(Debug, Default)]
pub struct AlwaysDenyAccess;

impl AlwaysDenyAccess {
    pub const NAME: &'static str = "AlwaysDenyAccess";
}

impl PermissionComponent for AlwaysDenyAccess {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, _input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        Ok(false)
    }
}

/// Request hash computed with a known browser exam key
#[derive(Debug, Default)]
pub struct CheckSebHashBrowserExamKey;

impl CheckSebHashBrowserExamKey {
    pub const NAME: &'static str = "CheckSEBHashBrowserExamKey";
}

impl PermissionComponent for CheckSebHashBrowserExamKey {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        header_matches_any(
            Self::NAME,
            REQUEST_HASH_HEADER,
            &input.keys.browser_keys,
            input,
        )
    }
}

/// Config key hash computed with a known config key
#[derive(Debug, Default)]
pub struct CheckSebHashConfigKey;

impl CheckSebHashConfigKey {
    pub const NAME: &'static str = "CheckSEBHashConfigKey";
}

impl PermissionComponent for CheckSebHashConfigKey {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        header_matches_any(
            Self::NAME,
            CONFIG_KEY_HASH_HEADER,
            &input.keys.config_keys,
            input,
        )
    }
}

/// Either the browser exam key or the config key hash matches
#[derive(Debug, Default)]
pub struct CheckSebKeysRequestHash;

impl CheckSebKeysRequestHash {
    pub const NAME: &'static str = "CheckSEBKeysRequestHash";
}

impl PermissionComponent for CheckSebKeysRequestHash {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
        // A malformed header on one side must not hide a valid hash on the other
        let browser = CheckSebHashBrowserExamKey.check(input).unwrap_or(false);
        if browser {
            return Ok(true);
        }
        CheckSebHashConfigKey.check(input)
    }
}

inventory::submit! {
    ComponentRegistration { name: AlwaysAllowStaff::NAME, build: build::<AlwaysAllowStaff> }
}

inventory::submit! {
    ComponentRegistration { name: AlwaysGrantAccess::NAME, build: build::<AlwaysGrantAccess> }
}

inventory::submit! {
    ComponentRegistration { name: AlwaysDenyAccess::NAME, build: build::<AlwaysDenyAccess> }
}

inventory::submit! {
    ComponentRegistration {
        name: CheckSebHashBrowserExamKey::NAME,
        build: build::<CheckSebHashBrowserExamKey>,
    }
}

inventory::submit! {
    ComponentRegistration {
        name: CheckSebHashConfigKey::NAME,
        build: build::<CheckSebHashConfigKey>,
    }
}

inventory::submit! {
    ComponentRegistration {
        name: CheckSebKeysRequestHash::NAME,
        build: build::<CheckSebKeysRequestHash>,
    }
}
