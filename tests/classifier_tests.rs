//! Path and chapter classification tests

use rstest::rstest;
use seb_gate::config::default_aliases;
use seb_gate::courses::{CourseResolver, StaticCatalog};
use seb_gate::config::{CatalogConfig, ChapterEntry, CourseEntry};
use seb_gate::gate::{CourseKey, GatePolicy, PathClassifier, RouteContext};
use std::collections::BTreeMap;

const COURSE: &str = "course-v1:edX+DemoX+2024";

fn classifier() -> PathClassifier {
    PathClassifier::new(&default_aliases())
}

fn course() -> CourseKey {
    CourseKey::parse(COURSE).unwrap()
}

fn catalog() -> StaticCatalog {
    StaticCatalog::from_config(&CatalogConfig {
        courses: vec![CourseEntry {
            id: COURSE.to_string(),
            display_name: "Demo".to_string(),
            chapters: vec![
                ChapterEntry {
                    id: "week1".to_string(),
                    display_name: "Week 1".to_string(),
                    blocks: vec!["block-v1:edX+DemoX+2024+type@html+block@welcome".to_string()],
                },
                ChapterEntry {
                    id: "exam".to_string(),
                    display_name: "Exam".to_string(),
                    blocks: vec!["block-v1:edX+DemoX+2024+type@problem+block@q1".to_string()],
                },
            ],
            seb: None,
        }],
    })
    .unwrap()
}

#[rstest]
#[case::discussion("discussion.views", "forum_form_discussion", None, &["discussion"], true)]
#[case::discussion_submodule("discussion.views.threads", "single_thread", None, &["discussion"], true)]
#[case::wiki("course_wiki.views", "course_wiki_redirect", None, &["wiki"], true)]
#[case::outline(
    "openedx.features.course_experience.views.course_outline",
    "CourseOutlineFragmentView",
    None,
    &["course-outline"],
    true
)]
#[case::wrong_alias("course_wiki.views", "course_wiki_redirect", None, &["discussion"], false)]
#[case::xblock_flag("courseware.module_render", "handle_xblock_callback", None, &["courseware"], true)]
#[case::xblock_without_flag("courseware.module_render", "handle_xblock_callback", None, &["wiki"], false)]
#[case::url_name_prefix("courseware.views.views", "progress", Some("progress_user"), &["progress"], true)]
#[case::jump_to("courseware.views.views", "jump_to", Some("jump_to"), &[], true)]
#[case::jump_to_id("courseware.views.views", "jump_to_id", Some("jump_to_id"), &[], true)]
#[case::unlisted("courseware.views.views", "course_info", Some("info"), &["progress"], false)]
#[case::index_by_url_name("courseware.views.index", "CoursewareIndex", Some("courseware_section"), &["courseware"], true)]
fn test_whitelist(
    #[case] module: &str,
    #[case] handler: &str,
    #[case] url_name: Option<&str>,
    #[case] whitelist: &[&str],
    #[case] expected: bool,
) {
    let mut route = RouteContext::new(module, handler);
    if let Some(name) = url_name {
        route = route.with_url_name(name);
    }
    let policy = GatePolicy::with_lists(whitelist, &[]);

    assert_eq!(classifier().is_whitelisted(&route, &policy), expected);
}

#[test]
fn test_custom_alias_table() {
    let aliases = BTreeMap::from([("lms.djangoapps.teams".to_string(), "teams".to_string())]);
    let classifier = PathClassifier::new(&aliases);
    let policy = GatePolicy::with_lists(&["teams"], &[]);

    let route = RouteContext::new("lms.djangoapps.teams.views", "TeamsDashboardView");
    assert!(classifier.is_whitelisted(&route, &policy));

    let wiki = RouteContext::new("course_wiki.views", "course_wiki_redirect");
    assert!(!classifier.is_whitelisted(&wiki, &GatePolicy::with_lists(&["wiki"], &[])));
}

#[rstest]
#[case::chapter_param(Some("exam"), None, &["courseware"], true)]
#[case::chapter_param_without_courseware_flag(Some("exam"), None, &[], true)]
#[case::other_chapter(Some("week1"), None, &["courseware"], false)]
#[case::block_in_exam(None, Some("block-v1:edX+DemoX+2024+type@problem+block@q1"), &["courseware"], true)]
#[case::block_in_week1(None, Some("block-v1:edX+DemoX+2024+type@html+block@welcome"), &["courseware"], false)]
#[case::block_needs_courseware_flag(None, Some("block-v1:edX+DemoX+2024+type@problem+block@q1"), &["wiki"], false)]
#[case::unknown_block(None, Some("block-v1:edX+DemoX+2024+type@problem+block@zz"), &["courseware"], false)]
#[case::malformed_block(None, Some("not-a-usage-key"), &["courseware"], false)]
#[tokio::test]
async fn test_blacklisted_chapter(
    #[case] chapter: Option<&str>,
    #[case] usage_id: Option<&str>,
    #[case] whitelist: &[&str],
    #[case] expected: bool,
) {
    let mut route = if usage_id.is_some() {
        RouteContext::new("courseware.module_render", "handle_xblock_callback")
    } else {
        RouteContext::new("courseware.views.index", "CoursewareIndex")
    };
    if let Some(chapter) = chapter {
        route = route.with_kwarg("chapter", chapter);
    }
    if let Some(usage_id) = usage_id {
        route = route.with_kwarg("usage_id", usage_id);
    }
    let policy = GatePolicy::with_lists(whitelist, &["exam"]);

    let blacklisted = classifier()
        .is_blacklisted_chapter(&route, &course(), &policy, &catalog())
        .await;
    assert_eq!(blacklisted, expected);
}

#[tokio::test]
async fn test_empty_blacklist_never_matches() {
    let route = RouteContext::new("courseware.views.index", "CoursewareIndex")
        .with_kwarg("chapter", "exam");
    let policy = GatePolicy::with_lists(&["courseware"], &[]);

    assert!(
        !classifier()
            .is_blacklisted_chapter(&route, &course(), &policy, &catalog())
            .await
    );
}

#[tokio::test]
async fn test_catalog_resolves_chapter_directly() {
    let chapter = catalog()
        .chapter_for_block("block-v1:edX+DemoX+2024+type@problem+block@q1", &course())
        .await
        .unwrap();
    assert_eq!(chapter.as_deref(), Some("exam"));
}
