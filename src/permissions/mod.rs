//! Permission components
//!
//! Pluggable predicates answering "does this request satisfy condition X?".
//! Components register themselves at compile time with
//! `inventory::submit!`; the configured name list is resolved against the
//! registry once at startup into a fixed, ordered sequence.
//!
//! ## Built-in components
//!
//! | Name | Satisfied when |
//! |---|---|
//! | `AlwaysAllowStaff` | user is staff and not masquerading as a student |
//! | `AlwaysGrantAccess` | always |
//! | `AlwaysDenyAccess` | never |
//! | `CheckSEBHashBrowserExamKey` | request hash matches a browser exam key |
//! | `CheckSEBHashConfigKey` | config key hash matches a config key |
//! | `CheckSEBKeysRequestHash` | either of the two above |

pub mod components;
pub mod keys;

pub use components::{
    AlwaysAllowStaff, AlwaysDenyAccess, AlwaysGrantAccess, CheckSebHashBrowserExamKey,
    CheckSebHashConfigKey, CheckSebKeysRequestHash,
};
pub use keys::KeyMaterial;

use crate::error::{ConfigError, PermissionError};
use crate::gate::keys::CourseKey;
use crate::gate::types::{Masquerade, RequestContext};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Everything a component may look at
#[derive(Debug, Clone, Copy)]
pub struct PermissionInput<'a> {
    pub request: &'a RequestContext,
    pub course: &'a CourseKey,
    /// Only set when the engine runs masquerade-aware
    pub masquerade: Option<&'a Masquerade>,
    pub keys: &'a KeyMaterial,
}

/// A stateless access predicate
pub trait PermissionComponent: Send + Sync {
    /// Stable registry name
    fn name(&self) -> &'static str;

    /// Whether the request satisfies this component
    fn check(&self, input: &PermissionInput<'_>) -> Result<bool, PermissionError>;
}

/// Shared component handle
pub type SharedComponent = Arc<dyn PermissionComponent>;

/// Compile-time component registration entry
pub struct ComponentRegistration {
    /// Registry name
    pub name: &'static str,
    /// Constructor
    pub build: fn() -> SharedComponent,
}

inventory::collect!(ComponentRegistration);

/// Name → component instance map
pub struct PermissionRegistry {
    components: HashMap<&'static str, SharedComponent>,
}

impl PermissionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
        }
    }

    /// Registry holding every component submitted with `inventory::submit!`
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for registration in inventory::iter::<ComponentRegistration> {
            let component = (registration.build)();
            debug!(name = registration.name, "Registered permission component");
            registry.components.insert(registration.name, component);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<SharedComponent> {
        self.components.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Resolve a configured name list, failing on the first unknown name.
    ///
    /// Used at startup, where a typo must stop the process.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<SharedComponent>, ConfigError> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| ConfigError::UnknownComponent {
                    name: name.clone(),
                })
            })
            .collect()
    }

    /// Resolve a name list, skipping unknown names with a warning.
    ///
    /// Used for per-course records, which are edited at runtime by operators.
    pub fn resolve_lenient(&self, names: &[String]) -> Vec<SharedComponent> {
        names
            .iter()
            .filter_map(|name| {
                let component = self.get(name);
                if component.is_none() {
                    warn!(component = %name, "Skipping unknown permission component");
                }
                component
            })
            .collect()
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one component, turning errors and panics into "not satisfied"
pub fn run_component(component: &dyn PermissionComponent, input: &PermissionInput<'_>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| component.check(input))) {
        Ok(Ok(satisfied)) => {
            trace!(component = component.name(), satisfied, "Component evaluated");
            satisfied
        }
        Ok(Err(e)) => {
            warn!(
                component = component.name(),
                course = %input.course,
                error = %e,
                "Permission component failed, treating as not satisfied"
            );
            false
        }
        Err(_) => {
            warn!(
                component = component.name(),
                course = %input.course,
                "Permission component panicked, treating as not satisfied"
            );
            false
        }
    }
}

/// Evaluate every component in order.
///
/// Returns the name of the first satisfied component. All components run
/// even after one is satisfied, so a faulty one is always surfaced in logs.
pub fn evaluate_components(
    components: &[SharedComponent],
    input: &PermissionInput<'_>,
) -> Option<&'static str> {
    let mut satisfied_by = None;
    for component in components {
        if run_component(component.as_ref(), input) && satisfied_by.is_none() {
            satisfied_by = Some(component.name());
        }
    }
    satisfied_by
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Exploding;

    impl PermissionComponent for Exploding {
        fn name(&self) -> &'static str {
            "Exploding"
        }

        fn check(&self, _input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
            panic!("component bug");
        }
    }

    struct Failing;

    impl PermissionComponent for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn check(&self, _input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
            Err(PermissionError::new("Failing", "backend down"))
        }
    }

    struct Counting(Arc<AtomicUsize>, bool);

    impl PermissionComponent for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        fn check(&self, _input: &PermissionInput<'_>) -> Result<bool, PermissionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(self.1)
        }
    }

    fn course() -> CourseKey {
        CourseKey::parse("course-v1:edX+DemoX+2024").unwrap()
    }

    #[test]
    fn test_builtin_registry_has_all_components() {
        let registry = PermissionRegistry::builtin();
        for name in [
            "AlwaysAllowStaff",
            "AlwaysGrantAccess",
            "AlwaysDenyAccess",
            "CheckSEBHashBrowserExamKey",
            "CheckSEBHashConfigKey",
            "CheckSEBKeysRequestHash",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_resolve_preserves_order() {
        let registry = PermissionRegistry::builtin();
        let resolved = registry
            .resolve(&["AlwaysDenyAccess".to_string(), "AlwaysAllowStaff".to_string()])
            .unwrap();
        let names: Vec<_> = resolved.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["AlwaysDenyAccess", "AlwaysAllowStaff"]);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = PermissionRegistry::builtin();
        let result = registry.resolve(&["DoesNotExist".to_string()]);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownComponent { name }) if name == "DoesNotExist"
        ));
    }

    #[test]
    fn test_resolve_lenient_skips_unknown() {
        let registry = PermissionRegistry::builtin();
        let resolved =
            registry.resolve_lenient(&["Nope".to_string(), "AlwaysGrantAccess".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "AlwaysGrantAccess");
    }

    #[test]
    fn test_faulting_components_do_not_abort_evaluation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let components: Vec<SharedComponent> = vec![
            Arc::new(Exploding),
            Arc::new(Failing),
            Arc::new(Counting(calls.clone(), true)),
        ];

        let request = RequestContext::default();
        let course = course();
        let keys = KeyMaterial::default();
        let input = PermissionInput {
            request: &request,
            course: &course,
            masquerade: None,
            keys: &keys,
        };

        assert_eq!(evaluate_components(&components, &input), Some("Counting"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_components_run_after_first_satisfied() {
        let calls = Arc::new(AtomicUsize::new(0));
        let components: Vec<SharedComponent> = vec![
            Arc::new(AlwaysGrantAccess),
            Arc::new(Counting(calls.clone(), false)),
        ];

        let request = RequestContext::default();
        let course = course();
        let keys = KeyMaterial::default();
        let input = PermissionInput {
            request: &request,
            course: &course,
            masquerade: None,
            keys: &keys,
        };

        assert_eq!(
            evaluate_components(&components, &input),
            Some("AlwaysGrantAccess")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_components_not_satisfied() {
        let request = RequestContext::default();
        let course = course();
        let keys = KeyMaterial::default();
        let input = PermissionInput {
            request: &request,
            course: &course,
            masquerade: None,
            keys: &keys,
        };
        assert_eq!(evaluate_components(&[], &input), None);
    }
}
