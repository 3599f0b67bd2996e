//! Gate types
//!
//! Per-request inputs and outputs of the decision engine. Everything here is
//! built once per intercepted request and treated as read-only afterwards.

use crate::gate::keys::CourseKey;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Handler name of the generic content-block callback
pub const XBLOCK_CALLBACK_HANDLER: &str = "handle_xblock_callback";

/// Handler name of the primary courseware view
pub const COURSEWARE_INDEX_HANDLER: &str = "CoursewareIndex";

/// Module hosting the staff masquerade view
pub const MASQUERADE_MODULE: &str = "courseware.masquerade";

/// Module prefix of the course experience pages (outline, home)
pub const COURSE_EXPERIENCE_MODULE: &str = "openedx.features.course_experience";

/// Route parameter names that may carry the course key, in lookup order
pub const COURSE_KEY_PARAMS: &[&str] = &["course_key_string", "course_id"];

/// Metadata of the handler the host router resolved a request to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteContext {
    /// Module path of the handler (e.g. `courseware.views.index`)
    pub module: String,
    /// Handler name within the module (e.g. `CoursewareIndex`)
    pub handler: String,
    /// Named route, if the host gave it one
    pub url_name: Option<String>,
    /// Keyword route parameters
    pub kwargs: HashMap<String, String>,
}

impl RouteContext {
    pub fn new(module: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            handler: handler.into(),
            url_name: None,
            kwargs: HashMap::new(),
        }
    }

    pub fn with_url_name(mut self, url_name: impl Into<String>) -> Self {
        self.url_name = Some(url_name.into());
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Fully-qualified handler name, `module.handler`
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.handler.clone()
        } else {
            format!("{}.{}", self.module, self.handler)
        }
    }

    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }

    /// Course key from the route parameters.
    ///
    /// Returns `None` when no parameter is present or the first one present
    /// does not parse; either way the request is out of the gate's scope.
    pub fn course_key(&self) -> Option<CourseKey> {
        let raw = COURSE_KEY_PARAMS
            .iter()
            .find_map(|name| self.kwarg(name).filter(|v| !v.is_empty()))?;

        match CourseKey::parse(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable course key");
                None
            }
        }
    }

    pub fn chapter(&self) -> Option<&str> {
        self.kwarg("chapter")
    }

    pub fn usage_id(&self) -> Option<&str> {
        self.kwarg("usage_id")
    }

    pub fn is_xblock_callback(&self) -> bool {
        self.handler == XBLOCK_CALLBACK_HANDLER
    }

    pub fn is_courseware_index(&self) -> bool {
        self.handler == COURSEWARE_INDEX_HANDLER
    }

    pub fn is_masquerade_view(&self) -> bool {
        self.module == MASQUERADE_MODULE
    }

    /// Whether the target page shows the staff preview menu
    pub fn supports_preview_menu(&self) -> bool {
        self.is_courseware_index() || self.module.starts_with(COURSE_EXPERIENCE_MODULE)
    }
}

/// Authenticated user, as established by the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateUser {
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl GateUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_staff: false,
        }
    }

    pub fn staff(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_staff: true,
        }
    }
}

/// Role a staff member is previewing the course as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasqueradeRole {
    Staff,
    Student,
}

/// Session-scoped masquerade settings for one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Masquerade {
    pub role: MasqueradeRole,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<u64>,
}

impl Masquerade {
    pub fn as_student() -> Self {
        Self {
            role: MasqueradeRole::Student,
            user_name: None,
            group_id: None,
        }
    }

    pub fn as_staff() -> Self {
        Self {
            role: MasqueradeRole::Staff,
            user_name: None,
            group_id: None,
        }
    }
}

/// Explicit per-request context handed to the engine and its components
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated user, if any
    pub user: Option<GateUser>,
    /// Absolute URL as seen by the browser, used for SEB request hashes
    pub absolute_url: String,
    /// Path component of the request
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Session masquerade settings, keyed by course key string
    pub masquerade_settings: HashMap<String, Masquerade>,
}

impl RequestContext {
    pub fn new(absolute_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            absolute_url: absolute_url.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: GateUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_masquerade(mut self, course: &CourseKey, masquerade: Masquerade) -> Self {
        self.masquerade_settings
            .insert(course.to_string(), masquerade);
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.username.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_staff)
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Nothing exempted the request
    DefaultDeny,
    /// The target chapter is blacklisted
    BlacklistedChapter,
    /// The user is already banned from the course
    Banned,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::DefaultDeny => "default_deny",
            DenyReason::BlacklistedChapter => "blacklisted_chapter",
            DenyReason::Banned => "banned",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_denied(&self) -> bool {
        matches!(self, Verdict::Deny(_))
    }
}
