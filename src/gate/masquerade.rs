//! Masquerade context lookup

use crate::gate::keys::CourseKey;
use crate::gate::types::{Masquerade, RequestContext};

/// Source of the session's masquerade settings for a course
pub trait MasqueradeProvider: Send + Sync {
    fn masquerade(&self, ctx: &RequestContext, course: &CourseKey) -> Option<Masquerade>;
}

/// Reads the masquerade settings carried on the request context
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionMasqueradeProvider;

impl MasqueradeProvider for SessionMasqueradeProvider {
    fn masquerade(&self, ctx: &RequestContext, course: &CourseKey) -> Option<Masquerade> {
        ctx.masquerade_settings.get(&course.to_string()).cloned()
    }
}
