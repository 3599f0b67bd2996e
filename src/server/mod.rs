//! Demo host application
//!
//! A minimal courseware site whose course routes are protected by the gate.
//! Identity comes from request headers standing in for the host's session:
//!
//! | Header | Meaning |
//! |---|---|
//! | `X-Demo-User` | authenticated username |
//! | `X-Demo-Staff` | `true` / `1` for staff users |
//! | `X-Demo-Masquerade-Course` | course the session masquerades in |
//! | `X-Demo-Masquerade-Role` | `student` or `staff` |

use crate::bans::InMemoryBanStore;
use crate::config::AppConfig;
use crate::courses::{CourseResolver, StaticCatalog};
use crate::error::{AppError, ConfigError, Result};
use crate::gate::{CourseKey, DecisionEngine, GateUser, Masquerade, MasqueradeRole};
use crate::middleware::{
    DenialFragment, MasqueradeSession, ResponseSelector, RouteSpec, RouteTable, SebGate,
    seb_gate_middleware,
};
use crate::permissions::PermissionRegistry;
use crate::render::{BuiltinTemplates, escape_html};
use crate::util::bind_available;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const USER_HEADER: &str = "x-demo-user";
pub const STAFF_HEADER: &str = "x-demo-staff";
pub const MASQUERADE_COURSE_HEADER: &str = "x-demo-masquerade-course";
pub const MASQUERADE_ROLE_HEADER: &str = "x-demo-masquerade-role";

const COURSEWARE: &str = "/courses/{course_id}/courseware";
const COURSEWARE_CHAPTER: &str = "/courses/{course_id}/courseware/{chapter}";
const COURSEWARE_SECTION: &str = "/courses/{course_id}/courseware/{chapter}/{section}";
const XBLOCK_HANDLER: &str = "/courses/{course_id}/xblock/{usage_id}/handler/{handler}";
const WIKI: &str = "/courses/{course_id}/wiki";
const FORUM: &str = "/courses/{course_id}/discussion/forum";
const COURSE_HOME: &str = "/courses/{course_id}/course";
const PROGRESS: &str = "/courses/{course_id}/progress";
const JUMP_TO: &str = "/courses/{course_id}/jump_to/{location}";
const MASQUERADE: &str = "/courses/{course_key_string}/masquerade";
const DASHBOARD: &str = "/dashboard";

/// Shared state of the demo handlers
#[derive(Clone)]
pub struct DemoState {
    pub catalog: Arc<StaticCatalog>,
    pub bans: Arc<InMemoryBanStore>,
}

/// Handler identities of the gated demo routes
pub fn demo_routes() -> RouteTable {
    const INDEX: (&str, &str) = ("courseware.views.index", "CoursewareIndex");

    RouteTable::new()
        .route(COURSEWARE, RouteSpec::new(INDEX.0, INDEX.1).named("courseware"))
        .route(
            COURSEWARE_CHAPTER,
            RouteSpec::new(INDEX.0, INDEX.1).named("courseware_chapter"),
        )
        .route(
            COURSEWARE_SECTION,
            RouteSpec::new(INDEX.0, INDEX.1).named("courseware_section"),
        )
        .route(
            XBLOCK_HANDLER,
            RouteSpec::new("courseware.module_render", "handle_xblock_callback")
                .named("xblock_handler"),
        )
        .route(
            WIKI,
            RouteSpec::new("course_wiki.views", "course_wiki_redirect").named("course_wiki"),
        )
        .route(
            FORUM,
            RouteSpec::new("discussion.views", "forum_form_discussion")
                .named("forum_form_discussion"),
        )
        .route(
            COURSE_HOME,
            RouteSpec::new(
                "openedx.features.course_experience.views.course_home",
                "CourseHomeView",
            )
            .named("openedx.course_experience.course_home"),
        )
        .route(
            PROGRESS,
            RouteSpec::new("courseware.views.views", "progress").named("progress"),
        )
        .route(
            JUMP_TO,
            RouteSpec::new("courseware.views.views", "jump_to").named("jump_to"),
        )
        .route(
            MASQUERADE,
            RouteSpec::new("courseware.masquerade", "MasqueradeView").named("masquerade_update"),
        )
        .route(
            DASHBOARD,
            RouteSpec::new("student.views", "student_dashboard").named("dashboard"),
        )
}

/// Build the gate over the demo host's collaborators
pub fn build_gate(
    config: &AppConfig,
    catalog: Arc<StaticCatalog>,
    bans: Arc<InMemoryBanStore>,
) -> std::result::Result<SebGate, ConfigError> {
    let engine = DecisionEngine::from_config(
        config,
        PermissionRegistry::builtin(),
        bans,
        catalog.clone(),
    )?
    .with_course_configs(catalog.clone());

    let responses = ResponseSelector::new(
        Arc::new(BuiltinTemplates::new()),
        catalog,
        config.gate.response_policy,
    );

    Ok(SebGate::new(engine, demo_routes(), responses)
        .with_public_base_url(config.server.public_base_url.clone()))
}

/// Demo host router with the gate installed
pub fn build_router(gate: Arc<SebGate>, state: DemoState) -> Router {
    Router::new()
        .route(COURSEWARE, get(courseware_index))
        .route(COURSEWARE_CHAPTER, get(courseware_index))
        .route(COURSEWARE_SECTION, get(courseware_index))
        .route(XBLOCK_HANDLER, get(xblock_handler).post(xblock_handler))
        .route(WIKI, get(wiki))
        .route(FORUM, get(forum))
        .route(COURSE_HOME, get(course_home))
        .route(PROGRESS, get(progress))
        .route(JUMP_TO, get(jump_to))
        .route(MASQUERADE, get(masquerade))
        .route(DASHBOARD, get(dashboard))
        .route_layer(from_fn_with_state(gate, seb_gate_middleware))
        .route("/health", get(health))
        .route("/admin/bans/{course_id}", get(list_bans))
        .route("/admin/bans/{course_id}/{username}", axum::routing::delete(unban))
        .layer(from_fn(demo_identity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the demo host until Ctrl+C
pub async fn run_server(config: &AppConfig, host: &str, port: u16) -> Result<()> {
    let catalog = Arc::new(StaticCatalog::from_config(&config.catalog)?);
    let bans = Arc::new(InMemoryBanStore::new());
    let gate = Arc::new(build_gate(config, catalog.clone(), bans.clone())?);

    let router = build_router(gate, DemoState { catalog: catalog.clone(), bans });

    let listener = bind_available(host, port).await?;
    let addr = listener.local_addr()?;
    info!(
        courses = catalog.len(),
        "Demo host listening on http://{}",
        addr
    );
    info!("Press Ctrl+C to stop the server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

/// Establish the user and masquerade session from the demo headers
async fn demo_identity(mut request: Request, next: Next) -> Response {
    let headers = request.headers();
    let user = header_str(headers, USER_HEADER)
        .filter(|name| !name.is_empty())
        .map(|name| GateUser {
            username: name.to_string(),
            is_staff: header_str(headers, STAFF_HEADER)
                .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
        });

    let masquerade = match (
        header_str(headers, MASQUERADE_COURSE_HEADER),
        header_str(headers, MASQUERADE_ROLE_HEADER),
    ) {
        (Some(course), Some(role)) => match role.to_ascii_lowercase().as_str() {
            "student" => Some((course.to_string(), Masquerade::as_student())),
            "staff" => Some((course.to_string(), Masquerade::as_staff())),
            other => {
                warn!(role = other, "Ignoring unknown masquerade role");
                None
            }
        },
        _ => None,
    };

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    if let Some((course, settings)) = masquerade {
        request
            .extensions_mut()
            .insert(MasqueradeSession(HashMap::from([(course, settings)])));
    }

    next.run(request).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn page(title: &str, body: String) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    ))
}

async fn course_or_404(
    state: &DemoState,
    course_id: &str,
) -> std::result::Result<crate::courses::Course, StatusCode> {
    let key = CourseKey::parse(course_id).map_err(|_| StatusCode::NOT_FOUND)?;
    match state.catalog.get_course(&key, 1).await {
        Ok(Some(course)) => Ok(course),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(course = course_id, error = %e, "Course lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn courseware_index(
    State(state): State<DemoState>,
    Path(params): Path<HashMap<String, String>>,
    fragment: Option<Extension<DenialFragment>>,
) -> Response {
    let course_id = params.get("course_id").map(String::as_str).unwrap_or_default();
    let course = match course_or_404(&state, course_id).await {
        Ok(course) => course,
        Err(status) => return status.into_response(),
    };

    let menu: String = course
        .chapters
        .iter()
        .map(|c| format!("<li>{}</li>", escape_html(&c.display_name)))
        .collect();

    let content = match fragment {
        Some(Extension(fragment)) => fragment.html().to_string(),
        None => {
            let location = match (params.get("chapter"), params.get("section")) {
                (Some(chapter), Some(section)) => format!("{} / {}", chapter, section),
                (Some(chapter), None) => chapter.clone(),
                _ => "Course start".to_string(),
            };
            format!("<p class=\"unit\">{}</p>", escape_html(&location))
        }
    };

    page(
        &course.display_name,
        format!(
            "<nav class=\"course-menu\"><ul>{}</ul></nav>\n<section class=\"courseware\">{}</section>",
            menu, content
        ),
    )
    .into_response()
}

async fn xblock_handler(Path(params): Path<HashMap<String, String>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "usage_id": params.get("usage_id"),
        "handler": params.get("handler"),
        "success": true,
    }))
}

async fn wiki(State(state): State<DemoState>, Path(course_id): Path<String>) -> Response {
    simple_page(&state, &course_id, "Wiki").await
}

async fn forum(State(state): State<DemoState>, Path(course_id): Path<String>) -> Response {
    simple_page(&state, &course_id, "Discussion").await
}

async fn course_home(State(state): State<DemoState>, Path(course_id): Path<String>) -> Response {
    simple_page(&state, &course_id, "Course outline").await
}

async fn progress(State(state): State<DemoState>, Path(course_id): Path<String>) -> Response {
    simple_page(&state, &course_id, "Progress").await
}

async fn simple_page(state: &DemoState, course_id: &str, title: &str) -> Response {
    match course_or_404(state, course_id).await {
        Ok(course) => page(
            &format!("{} | {}", title, course.display_name),
            format!("<h1>{}</h1>", escape_html(title)),
        )
        .into_response(),
        Err(status) => status.into_response(),
    }
}

async fn jump_to(Path((course_id, location)): Path<(String, String)>) -> Response {
    (
        StatusCode::FOUND,
        [(
            axum::http::header::LOCATION,
            format!("/courses/{}/courseware?location={}", course_id, location),
        )],
    )
        .into_response()
}

async fn masquerade(
    Path(course_key): Path<String>,
    session: Option<Extension<MasqueradeSession>>,
) -> Json<serde_json::Value> {
    let active = session.and_then(|Extension(s)| s.0.get(&course_key).cloned());
    Json(serde_json::json!({
        "course_key": course_key,
        "active": active.as_ref().map(|m| m.role == MasqueradeRole::Student),
        "masquerade": active,
    }))
}

async fn dashboard(user: Option<Extension<GateUser>>) -> Html<String> {
    let name = user
        .map(|Extension(u)| u.username)
        .unwrap_or_else(|| "anonymous".to_string());
    page("Dashboard", format!("<h1>Welcome, {}</h1>", escape_html(&name)))
}

async fn health() -> &'static str {
    "ok"
}

async fn list_bans(
    State(state): State<DemoState>,
    Path(course_id): Path<String>,
) -> Response {
    match CourseKey::parse(&course_id) {
        Ok(key) => Json(state.bans.list_banned(&key)).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn unban(
    State(state): State<DemoState>,
    Path((course_id, username)): Path<(String, String)>,
) -> StatusCode {
    let Ok(key) = CourseKey::parse(&course_id) else {
        return StatusCode::NOT_FOUND;
    };
    if state.bans.unban(&username, &key) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
