//! Course and usage keys
//!
//! Opaque identifiers found in route parameters. Only the syntax is checked
//! here; whether a course actually exists is the resolver's business.

use crate::error::KeyError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const PART: &str = r"[A-Za-z0-9_.~%-]+";

static COURSE_V1: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^course-v1:({PART})\+({PART})\+({PART})$"))
        .expect("course key pattern is valid")
});

static COURSE_LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({PART})/({PART})/({PART})$"))
        .expect("legacy course key pattern is valid")
});

static USAGE_V1: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^block-v1:({PART})\+({PART})\+({PART})\+type@({PART})\+block@({PART})$"
    ))
    .expect("usage key pattern is valid")
});

/// Identity of a course run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
    /// Legacy `org/course/run` syntax
    deprecated: bool,
}

impl CourseKey {
    /// Parse either `course-v1:ORG+COURSE+RUN` or legacy `ORG/COURSE/RUN`
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        if let Some(caps) = COURSE_V1.captures(s) {
            return Ok(Self {
                org: caps[1].to_string(),
                course: caps[2].to_string(),
                run: caps[3].to_string(),
                deprecated: false,
            });
        }
        if let Some(caps) = COURSE_LEGACY.captures(s) {
            return Ok(Self {
                org: caps[1].to_string(),
                course: caps[2].to_string(),
                run: caps[3].to_string(),
                deprecated: true,
            });
        }
        Err(KeyError::InvalidCourseKey(s.to_string()))
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Same course run, ignoring which syntax each key was written in
    pub fn same_run(&self, other: &CourseKey) -> bool {
        self.org == other.org && self.course == other.course && self.run == other.run
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deprecated {
            write!(f, "{}/{}/{}", self.org, self.course, self.run)
        } else {
            write!(f, "course-v1:{}+{}+{}", self.org, self.course, self.run)
        }
    }
}

impl FromStr for CourseKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity of a single content block inside a course
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    course: CourseKey,
    block_type: String,
    block_id: String,
}

impl UsageKey {
    /// Parse `block-v1:ORG+COURSE+RUN+type@TYPE+block@ID`
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let caps = USAGE_V1
            .captures(s)
            .ok_or_else(|| KeyError::InvalidUsageKey(s.to_string()))?;

        Ok(Self {
            course: CourseKey {
                org: caps[1].to_string(),
                course: caps[2].to_string(),
                run: caps[3].to_string(),
                deprecated: false,
            },
            block_type: caps[4].to_string(),
            block_id: caps[5].to_string(),
        })
    }

    pub fn course_key(&self) -> &CourseKey {
        &self.course
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block-v1:{}+{}+{}+type@{}+block@{}",
            self.course.org, self.course.course, self.course.run, self.block_type, self.block_id
        )
    }
}

impl FromStr for UsageKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
