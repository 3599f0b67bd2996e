//! Denial responses
//!
//! A denied courseware index request is answered by the courseware page
//! itself, with the denial fragment in place of its content. Every other
//! denied request gets the full-page denial, or 404 when the course key
//! names no course.

use crate::config::ResponsePolicy;
use crate::courses::{CourseResolver, DENIAL_PAGE_DEPTH};
use crate::gate::{Denial, RequestContext, RouteContext};
use crate::render::{CHROME_TEMPLATE, FRAGMENT_TEMPLATE, PAGE_TEMPLATE, TemplateRenderer};
use axum::body::{Body, to_bytes};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

/// Largest courseware page re-bodied under the bare policy
const COURSEWARE_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Rendered denial fragment handed to the courseware index handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialFragment(pub String);

impl DenialFragment {
    pub fn html(&self) -> &str {
        &self.0
    }
}

/// Picks and renders the response for a denied request
pub struct ResponseSelector {
    renderer: Arc<dyn TemplateRenderer>,
    courses: Arc<dyn CourseResolver>,
    policy: ResponsePolicy,
    platform_name: String,
}

impl ResponseSelector {
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        courses: Arc<dyn CourseResolver>,
        policy: ResponsePolicy,
    ) -> Self {
        Self {
            renderer,
            courses,
            policy,
            platform_name: "Open edX".to_string(),
        }
    }

    pub fn with_platform_name(mut self, name: impl Into<String>) -> Self {
        self.platform_name = name.into();
        self
    }

    /// Build the denial response.
    ///
    /// `forward` re-invokes the courseware index handler with the fragment,
    /// keeping the original route arguments.
    pub async fn build_denial<F, Fut>(
        &self,
        denial: &Denial,
        route: &RouteContext,
        ctx: &RequestContext,
        forward: F,
    ) -> Response
    where
        F: FnOnce(DenialFragment) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut context = self.base_context(denial, route, ctx).await;

        if route.is_courseware_index() {
            let fragment = match self.renderer.render(FRAGMENT_TEMPLATE, &Value::Object(context)) {
                Ok(html) => html,
                Err(e) => return render_failed(&e),
            };
            let response = forward(DenialFragment(fragment)).await;
            return self.courseware_response(response).await;
        }

        let course = match self.courses.get_course(&denial.course, DENIAL_PAGE_DEPTH).await {
            Ok(Some(course)) => course,
            Ok(None) => {
                warn!(course = %denial.course, "Denied request for unknown course");
                return StatusCode::NOT_FOUND.into_response();
            }
            Err(e) => {
                error!(course = %denial.course, error = %e, "Course lookup failed");
                return StatusCode::FORBIDDEN.into_response();
            }
        };

        let title = format!("Access denied | {}", course.display_name);
        context.insert("course".to_string(), json!(course));
        context.insert(
            "request".to_string(),
            json!({ "path": ctx.path, "url": ctx.absolute_url }),
        );

        let page = match self.renderer.render(PAGE_TEMPLATE, &Value::Object(context)) {
            Ok(html) => html,
            Err(e) => return render_failed(&e),
        };

        let body = match self.policy {
            ResponsePolicy::Bare => page,
            ResponsePolicy::Themed => {
                let chrome = json!({
                    "title": title,
                    "platform_name": self.platform_name,
                    "user": ctx.username(),
                    "content": page,
                });
                match self.renderer.render(CHROME_TEMPLATE, &chrome) {
                    Ok(html) => html,
                    Err(e) => return render_failed(&e),
                }
            }
        };

        (StatusCode::FORBIDDEN, Html(body)).into_response()
    }

    /// Template context shared by both denial shapes
    async fn base_context(
        &self,
        denial: &Denial,
        route: &RouteContext,
        ctx: &RequestContext,
    ) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("banned".to_string(), json!(denial.already_banned));
        context.insert("reason".to_string(), json!(denial.reason));
        context.insert("course_id".to_string(), json!(denial.course.to_string()));

        if let Some(masquerade) = &denial.masquerade {
            let course = match self.courses.get_course(&denial.course, 0).await {
                Ok(course) => course,
                Err(e) => {
                    warn!(
                        course = %denial.course,
                        error = %e,
                        "Course lookup for masquerade failed"
                    );
                    None
                }
            };
            context.insert("course".to_string(), json!(course));
            context.insert(
                "supports_preview_menu".to_string(),
                json!(route.supports_preview_menu()),
            );
            context.insert("staff_access".to_string(), json!(ctx.is_staff()));
            context.insert("masquerade".to_string(), json!(masquerade));
        }

        context
    }

    async fn courseware_response(&self, response: Response) -> Response {
        // The index handler found no such course; that answer stands
        if response.status() == StatusCode::NOT_FOUND {
            warn!("Denied courseware request for unknown course");
            return response;
        }

        let (mut parts, body) = response.into_parts();
        match self.policy {
            ResponsePolicy::Themed => {
                parts.status = StatusCode::FORBIDDEN;
                Response::from_parts(parts, body)
            }
            ResponsePolicy::Bare => match to_bytes(body, COURSEWARE_BODY_LIMIT).await {
                Ok(bytes) => (StatusCode::FORBIDDEN, Html(Body::from(bytes))).into_response(),
                Err(e) => {
                    error!(error = %e, "Could not read courseware response body");
                    StatusCode::FORBIDDEN.into_response()
                }
            },
        }
    }
}

fn render_failed(e: &crate::error::RenderError) -> Response {
    error!(error = %e, "Denial template failed to render");
    StatusCode::FORBIDDEN.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::courses::StaticCatalog;
    use crate::render::BuiltinTemplates;

    fn selector(policy: ResponsePolicy) -> ResponseSelector {
        let catalog = StaticCatalog::from_config(&CatalogConfig::default()).unwrap();
        ResponseSelector::new(Arc::new(BuiltinTemplates::new()), Arc::new(catalog), policy)
    }

    fn page(status: StatusCode, body: impl Into<Body>) -> Response {
        (status, Html(body.into())).into_response()
    }

    #[tokio::test]
    async fn test_themed_keeps_headers_and_forces_forbidden() {
        let response = selector(ResponsePolicy::Themed)
            .courseware_response(page(StatusCode::OK, "<p>menu</p>"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(
            response
                .headers()
                .get(axum::http::header::CONTENT_TYPE)
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_not_found_from_index_is_kept() {
        for policy in [ResponsePolicy::Themed, ResponsePolicy::Bare] {
            let response = selector(policy)
                .courseware_response(StatusCode::NOT_FOUND.into_response())
                .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_bare_rebodies_page() {
        let response = selector(ResponsePolicy::Bare)
            .courseware_response(page(StatusCode::OK, "<p>menu</p>"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<p>menu</p>");
    }

    #[tokio::test]
    async fn test_bare_oversized_page_is_plain_forbidden() {
        let oversized = vec![b'x'; COURSEWARE_BODY_LIMIT + 1];
        let response = selector(ResponsePolicy::Bare)
            .courseware_response(page(StatusCode::OK, oversized))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
