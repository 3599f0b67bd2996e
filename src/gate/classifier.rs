//! Path and chapter classification
//!
//! Two filters run on top of the default deny:
//! 1. **Whitelist** (broad): exempt requests by handler alias, by the
//!    `courseware` xblock flag, or by URL-name prefix.
//! 2. **Blacklist** (granular): force-deny specific chapters, including
//!    chapters reached through a content-block callback.

use crate::courses::CourseResolver;
use crate::gate::keys::CourseKey;
use crate::gate::policy::GatePolicy;
use crate::gate::types::RouteContext;
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Whitelist entry that also exempts every xblock callback
pub const COURSEWARE_FLAG: &str = "courseware";

/// URL names always treated as whitelisted prefixes
pub const NAVIGATION_URL_NAMES: &[&str] = &["jump_to", "jump_to_id"];

/// Classifies a resolved route against the whitelist and blacklist
#[derive(Debug, Clone)]
pub struct PathClassifier {
    /// (module prefix, alias), longest prefix first
    aliases: Vec<(String, String)>,
}

impl PathClassifier {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut aliases: Vec<_> = aliases
            .iter()
            .filter(|(prefix, _)| !prefix.is_empty())
            .map(|(prefix, alias)| (prefix.clone(), alias.clone()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { aliases }
    }

    /// Alias of a handler module, by longest matching module prefix
    pub fn alias_for(&self, module: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(prefix, _)| {
                module
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
            })
            .map(|(_, alias)| alias.as_str())
    }

    /// Broad filter: is the route exempted from the default deny?
    pub fn is_whitelisted(&self, route: &RouteContext, policy: &GatePolicy) -> bool {
        if let Some(alias) = self.alias_for(&route.module)
            && policy.whitelists(alias)
        {
            trace!(alias, "Whitelisted by alias");
            return true;
        }

        if policy.whitelists(COURSEWARE_FLAG) && route.is_xblock_callback() {
            trace!("Whitelisted xblock callback");
            return true;
        }

        if let Some(url_name) = route.url_name.as_deref() {
            let matched = policy
                .whitelist_paths
                .iter()
                .map(String::as_str)
                .chain(NAVIGATION_URL_NAMES.iter().copied())
                .filter(|name| !name.is_empty())
                .find(|name| url_name.starts_with(name));
            if let Some(name) = matched {
                trace!(url_name, prefix = name, "Whitelisted by url name");
                return true;
            }
        }

        false
    }

    /// Granular filter: does the route target a blacklisted chapter?
    ///
    /// Chapter resolution failures count as "no chapter".
    pub async fn is_blacklisted_chapter(
        &self,
        route: &RouteContext,
        course: &CourseKey,
        policy: &GatePolicy,
        resolver: &dyn CourseResolver,
    ) -> bool {
        if policy.blacklist_chapters.is_empty() {
            return false;
        }

        if route
            .chapter()
            .is_some_and(|chapter| policy.blacklist_chapters.contains(chapter))
        {
            trace!(chapter = ?route.chapter(), "Chapter blacklisted");
            return true;
        }

        if policy.whitelists(COURSEWARE_FLAG)
            && route.is_xblock_callback()
            && let Some(usage_id) = route.usage_id()
        {
            return match resolver.chapter_for_block(usage_id, course).await {
                Ok(Some(chapter)) => {
                    let blacklisted = policy.blacklist_chapters.contains(&chapter);
                    trace!(usage_id, chapter = %chapter, blacklisted, "Resolved xblock chapter");
                    blacklisted
                }
                Ok(None) => false,
                Err(e) => {
                    warn!(
                        usage_id,
                        course = %course,
                        error = %e,
                        "Could not resolve chapter for block"
                    );
                    false
                }
            };
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_aliases;
    use crate::gate::types::XBLOCK_CALLBACK_HANDLER;

    fn classifier() -> PathClassifier {
        PathClassifier::new(&default_aliases())
    }

    #[test]
    fn test_alias_longest_prefix() {
        let mut aliases = default_aliases();
        aliases.insert("discussion".to_string(), "forum".to_string());
        let classifier = PathClassifier::new(&aliases);

        assert_eq!(classifier.alias_for("discussion.views"), Some("discussion"));
        assert_eq!(
            classifier.alias_for("discussion.views.threads"),
            Some("discussion")
        );
        assert_eq!(classifier.alias_for("discussion.rest_api"), Some("forum"));
    }

    #[test]
    fn test_alias_requires_module_boundary() {
        assert_eq!(classifier().alias_for("course_wiki.viewsets"), None);
        assert_eq!(classifier().alias_for("course_wiki.views"), Some("wiki"));
        assert_eq!(classifier().alias_for("courseware.views.index"), None);
    }

    #[test]
    fn test_whitelisted_by_alias() {
        let route = RouteContext::new("course_wiki.views", "course_wiki_redirect");
        let policy = GatePolicy::with_lists(&["wiki"], &[]);
        assert!(classifier().is_whitelisted(&route, &policy));

        let policy = GatePolicy::with_lists(&["discussion"], &[]);
        assert!(!classifier().is_whitelisted(&route, &policy));
    }

    #[test]
    fn test_whitelisted_xblock_with_courseware_flag() {
        let route = RouteContext::new("courseware.module_render", XBLOCK_CALLBACK_HANDLER);
        assert!(
            classifier().is_whitelisted(&route, &GatePolicy::with_lists(&["courseware"], &[]))
        );
        assert!(!classifier().is_whitelisted(&route, &GatePolicy::with_lists(&[], &[])));
    }

    #[test]
    fn test_whitelisted_by_url_name_prefix() {
        let route =
            RouteContext::new("courseware.views.views", "progress").with_url_name("progress_user");
        assert!(classifier().is_whitelisted(&route, &GatePolicy::with_lists(&["progress"], &[])));
        assert!(!classifier().is_whitelisted(&route, &GatePolicy::with_lists(&["info"], &[])));
    }

    #[test]
    fn test_navigation_url_names_always_whitelisted() {
        let route =
            RouteContext::new("courseware.views.views", "jump_to_id").with_url_name("jump_to_id");
        assert!(classifier().is_whitelisted(&route, &GatePolicy::with_lists(&[], &[])));
    }

    #[test]
    fn test_empty_whitelist_entry_ignored() {
        let route = RouteContext::new("courseware.views.views", "info").with_url_name("info");
        assert!(!classifier().is_whitelisted(&route, &GatePolicy::with_lists(&[""], &[])));
    }
}
