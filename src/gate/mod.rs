//! SEB access gate
//!
//! Decides, per request, whether the requesting browser may reach course
//! content.
//!
//! ## Evaluation order
//!
//! 1. No course key in the route → pass through
//! 2. Default deny
//! 3. Whitelisted alias, xblock flag or URL name → allow
//! 4. Blacklisted chapter → deny
//! 5. Banned user → deny, permission components skipped
//! 6. Any permission component satisfied → allow
//! 7. Still denied → ban the user (when enabled)

pub mod classifier;
pub mod engine;
pub mod keys;
pub mod masquerade;
pub mod policy;
pub mod types;

pub use classifier::PathClassifier;
pub use engine::{DecisionEngine, Denial, GateOutcome};
pub use keys::{CourseKey, UsageKey};
pub use masquerade::{MasqueradeProvider, SessionMasqueradeProvider};
pub use policy::GatePolicy;
pub use types::{
    DenyReason, GateUser, Masquerade, MasqueradeRole, RequestContext, RouteContext, Verdict,
};
