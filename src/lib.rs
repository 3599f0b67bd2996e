//! SEB Gate
//!
//! An access-control gate for courseware that admits only the Secure Exam
//! Browser into protected course content.
//!
//! ## Features
//!
//! - **Layered decision engine**: default deny, whitelist, chapter blacklist,
//!   pluggable permission components, and user banning
//! - **SEB key checks** over browser exam keys and config keys
//! - **Per-course overrides** of every gate setting
//! - **Axum middleware** with in-page and full-page denial responses
//! - **Flexible configuration** via TOML files and environment variables
//!
//! ## Decision Model
//!
//! ```text
//! default deny → whitelist → blacklisted chapter → ban check → permission components
//! ```
//!
//! A banned user is always denied. A denied user is banned from the course
//! when banning is enabled.
//!
//! ## Example Configuration
//!
//! ```toml
//! [gate]
//! whitelist_paths = ["wiki", "discussion", "courseware"]
//! blacklist_chapters = ["final-exam"]
//! permission_components = ["AlwaysAllowStaff", "CheckSEBKeysRequestHash"]
//!
//! [keys]
//! browser_keys = ["..."]            # or SEB_GATE__KEYS__BROWSER_KEYS
//!
//! [[catalog.courses]]
//! id = "course-v1:edX+DemoX+2024"
//! ```

pub mod bans;
pub mod config;
pub mod courses;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod permissions;
pub mod render;
pub mod server;
pub mod util;

// Re-export main types
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use gate::{DecisionEngine, GateOutcome, RequestContext, RouteContext, Verdict};
pub use middleware::{SebGate, seb_gate_middleware};
