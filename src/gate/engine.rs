//! Decision engine
//!
//! One evaluation per intercepted request:
//!
//! ```text
//! no course ──► pass through
//! default deny → whitelist (allow) → blacklisted chapter (deny)
//!   → banned? (deny, skip components) : components (any satisfied → allow)
//!   → deny ⇒ ban side effect
//! ```
//!
//! The engine performs at most one ban store read and at most one ban store
//! write per request. Collaborator failures never reach the caller: they are
//! logged and folded into the verdict.

use crate::bans::BanStore;
use crate::config::{AppConfig, KeysConfig};
use crate::courses::{CourseConfigStore, CourseResolver};
use crate::error::ConfigError;
use crate::gate::classifier::PathClassifier;
use crate::gate::keys::CourseKey;
use crate::gate::masquerade::{MasqueradeProvider, SessionMasqueradeProvider};
use crate::gate::policy::GatePolicy;
use crate::gate::types::{DenyReason, Masquerade, RequestContext, RouteContext, Verdict};
use crate::permissions::{PermissionInput, PermissionRegistry, evaluate_components};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Why a denied request was denied, and what the engine did about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub course: CourseKey,
    pub reason: DenyReason,
    /// The user was banned before this request
    pub already_banned: bool,
    /// This request recorded a new ban
    pub ban_recorded: bool,
    pub username: Option<String>,
    /// Active masquerade, only tracked in masquerade-aware mode
    pub masquerade: Option<Masquerade>,
}

impl Denial {
    /// Whether the user is banned once this request completes
    pub fn is_banned(&self) -> bool {
        self.already_banned || self.ban_recorded
    }
}

/// Result of evaluating one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Out of the gate's scope
    PassThrough,
    Allowed {
        course: CourseKey,
        /// First satisfied permission component, if any
        satisfied_by: Option<&'static str>,
    },
    Denied(Denial),
}

impl GateOutcome {
    pub fn verdict(&self) -> Verdict {
        match self {
            GateOutcome::PassThrough | GateOutcome::Allowed { .. } => Verdict::Allow,
            GateOutcome::Denied(denial) => Verdict::Deny(denial.reason),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.verdict().is_denied()
    }
}

/// Layered whitelist/blacklist/permission/ban evaluation
pub struct DecisionEngine {
    policy: GatePolicy,
    classifier: PathClassifier,
    registry: PermissionRegistry,
    keys_config: KeysConfig,
    masquerade_aware: bool,
    bans: Arc<dyn BanStore>,
    courses: Arc<dyn CourseResolver>,
    course_configs: Option<Arc<dyn CourseConfigStore>>,
    masquerade: Arc<dyn MasqueradeProvider>,
}

impl DecisionEngine {
    pub fn new(
        policy: GatePolicy,
        classifier: PathClassifier,
        bans: Arc<dyn BanStore>,
        courses: Arc<dyn CourseResolver>,
    ) -> Self {
        Self {
            policy,
            classifier,
            registry: PermissionRegistry::builtin(),
            keys_config: KeysConfig::default(),
            masquerade_aware: true,
            bans,
            courses,
            course_configs: None,
            masquerade: Arc::new(SessionMasqueradeProvider),
        }
    }

    /// Build the engine from configuration, resolving components once
    pub fn from_config(
        config: &AppConfig,
        registry: PermissionRegistry,
        bans: Arc<dyn BanStore>,
        courses: Arc<dyn CourseResolver>,
    ) -> Result<Self, ConfigError> {
        let policy = GatePolicy::from_config(&config.gate, &config.keys, &registry)?;
        info!(
            components = ?policy.component_names(),
            whitelist = ?policy.whitelist_paths,
            blacklist = policy.blacklist_chapters.len(),
            user_banning = policy.user_banning_enabled,
            masquerade_aware = config.gate.masquerade_aware,
            "Gate policy compiled"
        );

        Ok(Self {
            registry,
            keys_config: config.keys.clone(),
            masquerade_aware: config.gate.masquerade_aware,
            ..Self::new(
                policy,
                PathClassifier::new(&config.gate.aliases),
                bans,
                courses,
            )
        })
    }

    /// Consult per-course configuration records at decision time
    pub fn with_course_configs(mut self, store: Arc<dyn CourseConfigStore>) -> Self {
        self.course_configs = Some(store);
        self
    }

    pub fn with_masquerade_provider(mut self, provider: Arc<dyn MasqueradeProvider>) -> Self {
        self.masquerade = provider;
        self
    }

    pub fn with_masquerade_aware(mut self, aware: bool) -> Self {
        self.masquerade_aware = aware;
        self
    }

    /// Evaluate one request
    #[instrument(
        skip_all,
        fields(handler = %route.qualified_name(), user = ctx.username().unwrap_or("-"))
    )]
    pub async fn evaluate(&self, route: &RouteContext, ctx: &RequestContext) -> GateOutcome {
        let Some(course) = route.course_key() else {
            return GateOutcome::PassThrough;
        };

        if self.masquerade_aware && route.is_masquerade_view() {
            debug!(course = %course, "Masquerade view passes through");
            return GateOutcome::PassThrough;
        }

        let policy = self.course_policy(&course).await;
        let masquerade = if self.masquerade_aware {
            self.masquerade.masquerade(ctx, &course)
        } else {
            None
        };

        let mut denied = Some(DenyReason::DefaultDeny);

        if self.classifier.is_whitelisted(route, &policy) {
            denied = None;
        }

        if self
            .classifier
            .is_blacklisted_chapter(route, &course, &policy, self.courses.as_ref())
            .await
        {
            denied = Some(DenyReason::BlacklistedChapter);
        }

        let username = ctx.username();
        let already_banned = match username {
            Some(user) if policy.user_banning_enabled => self.check_banned(user, &course).await,
            _ => false,
        };

        let mut satisfied_by = None;
        if already_banned {
            denied = Some(DenyReason::Banned);
        } else {
            let input = PermissionInput {
                request: ctx,
                course: &course,
                masquerade: masquerade.as_ref(),
                keys: &policy.keys,
            };
            satisfied_by = evaluate_components(&policy.components, &input);
            if satisfied_by.is_some() {
                denied = None;
            }
        }

        let Some(reason) = denied else {
            debug!(course = %course, satisfied_by = ?satisfied_by, "Request allowed");
            return GateOutcome::Allowed {
                course,
                satisfied_by,
            };
        };

        let ban_recorded = match username {
            Some(user) if policy.user_banning_enabled && !already_banned => {
                self.record_ban(user, &course).await
            }
            _ => false,
        };

        info!(
            course = %course,
            reason = %reason,
            already_banned,
            ban_recorded,
            "Request denied"
        );

        GateOutcome::Denied(Denial {
            course,
            reason,
            already_banned,
            ban_recorded,
            username: username.map(str::to_string),
            masquerade,
        })
    }

    /// Global policy, overridden by the course's own record when one exists
    async fn course_policy(&self, course: &CourseKey) -> Cow<'_, GatePolicy> {
        let Some(store) = &self.course_configs else {
            return Cow::Borrowed(&self.policy);
        };

        match store.course_config(course).await {
            Ok(Some(record)) => {
                debug!(course = %course, "Applying course configuration");
                Cow::Owned(
                    self.policy
                        .overridden(&record, &self.keys_config, &self.registry),
                )
            }
            Ok(None) => Cow::Borrowed(&self.policy),
            Err(e) => {
                warn!(
                    course = %course,
                    error = %e,
                    "Course configuration unavailable, using global policy"
                );
                Cow::Borrowed(&self.policy)
            }
        }
    }

    async fn check_banned(&self, username: &str, course: &CourseKey) -> bool {
        match self.bans.is_banned(username, course).await {
            Ok(banned) => banned,
            Err(e) => {
                warn!(
                    user = username,
                    course = %course,
                    error = %e,
                    "Ban lookup failed, treating user as not banned"
                );
                false
            }
        }
    }

    async fn record_ban(&self, username: &str, course: &CourseKey) -> bool {
        match self.bans.ban(username, course, "").await {
            Ok(()) => {
                info!(user = username, course = %course, "User banned");
                true
            }
            Err(e) => {
                error!(
                    user = username,
                    course = %course,
                    error = %e,
                    "Failed to record ban"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bans::InMemoryBanStore;
    use crate::config::default_aliases;
    use crate::courses::StaticCatalog;
    use crate::gate::types::GateUser;
    use crate::permissions::{AlwaysAllowStaff, AlwaysGrantAccess, SharedComponent};

    const COURSE: &str = "course-v1:edX+DemoX+2024";

    fn engine(policy: GatePolicy) -> (DecisionEngine, Arc<InMemoryBanStore>) {
        let bans = Arc::new(InMemoryBanStore::new());
        let engine = DecisionEngine::new(
            policy,
            PathClassifier::new(&default_aliases()),
            bans.clone(),
            Arc::new(StaticCatalog::empty()),
        );
        (engine, bans)
    }

    fn progress_route() -> RouteContext {
        RouteContext::new("courseware.views.views", "progress")
            .with_url_name("progress")
            .with_kwarg("course_id", COURSE)
    }

    fn alice() -> RequestContext {
        RequestContext::new("http://lms/progress", "/progress").with_user(GateUser::new("alice"))
    }

    #[tokio::test]
    async fn test_no_course_passes_through() {
        let (engine, bans) = engine(GatePolicy::with_lists(&[], &[]));
        let route = RouteContext::new("student.views", "dashboard");
        assert_eq!(engine.evaluate(&route, &alice()).await, GateOutcome::PassThrough);
        assert!(bans.is_empty());
    }

    #[tokio::test]
    async fn test_default_deny_bans_user() {
        let (engine, bans) = engine(GatePolicy::with_lists(&[], &[]));
        let outcome = engine.evaluate(&progress_route(), &alice()).await;

        let GateOutcome::Denied(denial) = outcome else {
            panic!("expected denial");
        };
        assert_eq!(denial.reason, DenyReason::DefaultDeny);
        assert!(denial.ban_recorded);
        assert!(!denial.already_banned);
        assert_eq!(bans.len(), 1);
    }

    #[tokio::test]
    async fn test_second_denial_reports_banned() {
        let (engine, bans) = engine(GatePolicy::with_lists(&[], &[]));
        engine.evaluate(&progress_route(), &alice()).await;
        let outcome = engine.evaluate(&progress_route(), &alice()).await;

        assert_eq!(outcome.verdict(), Verdict::Deny(DenyReason::Banned));
        assert_eq!(bans.len(), 1);
    }

    #[tokio::test]
    async fn test_component_allows() {
        let mut policy = GatePolicy::with_lists(&[], &[]);
        policy.components = vec![
            Arc::new(AlwaysAllowStaff) as SharedComponent,
            Arc::new(AlwaysGrantAccess) as SharedComponent,
        ];
        let (engine, bans) = engine(policy);

        let outcome = engine.evaluate(&progress_route(), &alice()).await;
        assert_eq!(
            outcome,
            GateOutcome::Allowed {
                course: CourseKey::parse(COURSE).unwrap(),
                satisfied_by: Some("AlwaysGrantAccess"),
            }
        );
        assert!(bans.is_empty());
    }

    #[tokio::test]
    async fn test_masquerade_view_passes_through_when_aware() {
        let route = RouteContext::new("courseware.masquerade", "MasqueradeView")
            .with_kwarg("course_key_string", COURSE);

        let (engine, _) = engine(GatePolicy::with_lists(&[], &[]));
        assert_eq!(engine.evaluate(&route, &alice()).await, GateOutcome::PassThrough);

        let engine = engine_unaware();
        assert!(engine.evaluate(&route, &alice()).await.is_denied());
    }

    fn engine_unaware() -> DecisionEngine {
        engine(GatePolicy::with_lists(&[], &[]))
            .0
            .with_masquerade_aware(false)
    }

    #[tokio::test]
    async fn test_anonymous_denied_without_ban() {
        let (engine, bans) = engine(GatePolicy::with_lists(&[], &[]));
        let ctx = RequestContext::new("http://lms/progress", "/progress");
        let GateOutcome::Denied(denial) = engine.evaluate(&progress_route(), &ctx).await else {
            panic!("expected denial");
        };
        assert!(!denial.ban_recorded);
        assert_eq!(denial.username, None);
        assert!(bans.is_empty());
    }
}
