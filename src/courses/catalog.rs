//! Static course catalog
//!
//! Courses, chapters, and blocks declared in the `[catalog]` section of the
//! configuration. Serves as both the course resolver and the per-course
//! configuration store of the demo host.

use crate::config::{CatalogConfig, CourseSebConfig};
use crate::courses::{Chapter, Course, CourseConfigStore, CourseResolver};
use crate::error::{ConfigError, ResolverResult};
use crate::gate::keys::{CourseKey, UsageKey};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::trace;

struct CatalogCourse {
    course: Course,
    seb: Option<CourseSebConfig>,
}

/// In-memory course catalog
pub struct StaticCatalog {
    courses: HashMap<CourseKey, CatalogCourse>,
}

impl StaticCatalog {
    /// Build from configuration, rejecting unparseable course ids
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigError> {
        let mut courses = HashMap::new();
        for entry in &config.courses {
            let key = CourseKey::parse(&entry.id).map_err(|e| ConfigError::Invalid {
                message: format!("catalog.courses: {}", e),
            })?;

            let chapters = entry
                .chapters
                .iter()
                .map(|c| Chapter {
                    id: c.id.clone(),
                    display_name: if c.display_name.is_empty() {
                        c.id.clone()
                    } else {
                        c.display_name.clone()
                    },
                    blocks: c.blocks.clone(),
                })
                .collect();

            let display_name = if entry.display_name.is_empty() {
                entry.id.clone()
            } else {
                entry.display_name.clone()
            };

            courses.insert(
                key.clone(),
                CatalogCourse {
                    course: Course {
                        key,
                        display_name,
                        chapters,
                    },
                    seb: entry.seb.clone(),
                },
            );
        }
        Ok(Self { courses })
    }

    pub fn empty() -> Self {
        Self {
            courses: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    fn truncate(course: &Course, depth: u32) -> Course {
        let chapters = match depth {
            0 => Vec::new(),
            1 => course
                .chapters
                .iter()
                .map(|c| Chapter {
                    blocks: Vec::new(),
                    ..c.clone()
                })
                .collect(),
            _ => course.chapters.clone(),
        };
        Course {
            chapters,
            ..course.clone()
        }
    }
}

#[async_trait]
impl CourseResolver for StaticCatalog {
    async fn get_course(&self, key: &CourseKey, depth: u32) -> ResolverResult<Option<Course>> {
        Ok(self
            .courses
            .get(key)
            .map(|entry| Self::truncate(&entry.course, depth)))
    }

    async fn chapter_for_block(
        &self,
        usage_id: &str,
        key: &CourseKey,
    ) -> ResolverResult<Option<String>> {
        let usage = UsageKey::parse(usage_id)?;
        if !usage.course_key().same_run(key) {
            trace!(usage = usage_id, course = %key, "Block belongs to another course");
            return Ok(None);
        }

        let Some(entry) = self.courses.get(key) else {
            return Ok(None);
        };

        let chapter = entry.course.chapters.iter().find(|chapter| {
            (usage.block_type() == "chapter" && usage.block_id() == chapter.id)
                || chapter.blocks.iter().any(|block| {
                    block == usage_id
                        || UsageKey::parse(block).is_ok_and(|b| b.block_id() == usage.block_id())
                })
        });

        Ok(chapter.map(|c| c.id.clone()))
    }
}

#[async_trait]
impl CourseConfigStore for StaticCatalog {
    async fn course_config(&self, key: &CourseKey) -> ResolverResult<Option<CourseSebConfig>> {
        Ok(self.courses.get(key).and_then(|entry| entry.seb.clone()))
    }
}
