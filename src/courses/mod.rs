//! Course lookup
//!
//! Narrow interfaces to the host application's course content and to the
//! per-course SEB configuration records, plus a static catalog backing both.

pub mod catalog;

pub use catalog::StaticCatalog;
pub use crate::config::CourseSebConfig;

use crate::error::ResolverResult;
use crate::gate::keys::CourseKey;
// async_trait required for dyn-compatibility with Arc<dyn CourseResolver>
use async_trait::async_trait;
use serde::Serialize;

/// Depth the full-page denial loads a course at
pub const DENIAL_PAGE_DEPTH: u32 = 2;

/// A course, loaded to some depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    #[serde(serialize_with = "serialize_key")]
    pub key: CourseKey,
    pub display_name: String,
    /// Empty at depth 0
    pub chapters: Vec<Chapter>,
}

/// A top-level section of a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub id: String,
    pub display_name: String,
    /// Usage ids below the chapter; empty below depth 2
    pub blocks: Vec<String>,
}

fn serialize_key<S: serde::Serializer>(key: &CourseKey, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(key)
}

/// Host application course content
#[async_trait]
pub trait CourseResolver: Send + Sync {
    /// Load a course; `Ok(None)` when the key parses but names no course
    async fn get_course(&self, key: &CourseKey, depth: u32) -> ResolverResult<Option<Course>>;

    /// Chapter owning a content block; `Ok(None)` when not found
    async fn chapter_for_block(
        &self,
        usage_id: &str,
        key: &CourseKey,
    ) -> ResolverResult<Option<String>>;
}

/// Read contract of the per-course configuration store
#[async_trait]
pub trait CourseConfigStore: Send + Sync {
    async fn course_config(&self, key: &CourseKey) -> ResolverResult<Option<CourseSebConfig>>;
}
