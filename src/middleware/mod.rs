//! Axum integration
//!
//! [`seb_gate_middleware`] runs as a route layer, after the router has
//! matched the request, so the handler's identity and path parameters are
//! known before the handler executes. Routes the [`RouteTable`] does not
//! describe are not gated.
//!
//! Upstream middleware supplies the authenticated user as a [`GateUser`]
//! extension and the session masquerade settings as a [`MasqueradeSession`]
//! extension.

pub mod response;

pub use response::{DenialFragment, ResponseSelector};

use crate::gate::{DecisionEngine, GateOutcome, GateUser, Masquerade, RequestContext, RouteContext};
use crate::util::join_url;
use axum::extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State};
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Handler identity of one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub module: String,
    pub handler: String,
    pub url_name: Option<String>,
}

impl RouteSpec {
    pub fn new(module: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            handler: handler.into(),
            url_name: None,
        }
    }

    pub fn named(mut self, url_name: impl Into<String>) -> Self {
        self.url_name = Some(url_name.into());
        self
    }

    /// Route context for one request, with its decoded path parameters
    pub fn context<'a>(
        &self,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> RouteContext {
        let mut route = RouteContext::new(&self.module, &self.handler);
        route.url_name = self.url_name.clone();
        for (key, value) in params {
            route = route.with_kwarg(key, value);
        }
        route
    }
}

/// Matched path pattern → handler identity
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteSpec>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path pattern, exactly as passed to `Router::route`
    pub fn route(mut self, path: impl Into<String>, spec: RouteSpec) -> Self {
        self.routes.insert(path.into(), spec);
        self
    }

    pub fn get(&self, path: &str) -> Option<&RouteSpec> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Session masquerade settings, keyed by course key string
#[derive(Debug, Clone, Default)]
pub struct MasqueradeSession(pub HashMap<String, Masquerade>);

/// Shared state of the gate middleware
pub struct SebGate {
    engine: DecisionEngine,
    routes: RouteTable,
    responses: ResponseSelector,
    public_base_url: Option<String>,
}

impl SebGate {
    pub fn new(engine: DecisionEngine, routes: RouteTable, responses: ResponseSelector) -> Self {
        Self {
            engine,
            routes,
            responses,
            public_base_url: None,
        }
    }

    /// Base URL browsers use to reach the host, for SEB request hashes
    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url;
        self
    }

    fn request_context(&self, parts: &Parts) -> RequestContext {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let base = match &self.public_base_url {
            Some(url) => url.clone(),
            None => {
                let host = parts
                    .headers
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("localhost");
                format!("http://{}", host)
            }
        };

        let mut ctx = RequestContext::new(join_url(&base, path_and_query), parts.uri.path())
            .with_headers(parts.headers.clone());
        ctx.user = parts.extensions.get::<GateUser>().cloned();
        if let Some(session) = parts.extensions.get::<MasqueradeSession>() {
            ctx.masquerade_settings = session.0.clone();
        }
        ctx
    }
}

/// Gate middleware, installed with `from_fn_with_state` as a route layer
pub async fn seb_gate_middleware(
    State(gate): State<Arc<SebGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let spec = parts
        .extensions
        .get::<MatchedPath>()
        .and_then(|matched| gate.routes.get(matched.as_str()))
        .cloned();
    let Some(spec) = spec else {
        trace!(path = parts.uri.path(), "Route not gated");
        return next.run(Request::from_parts(parts, body)).await;
    };

    let route = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(params) => spec.context(params.iter()),
        Err(_) => spec.context(std::iter::empty()),
    };
    let ctx = gate.request_context(&parts);
    let request = Request::from_parts(parts, body);

    match gate.engine.evaluate(&route, &ctx).await {
        GateOutcome::Denied(denial) => {
            gate.responses
                .build_denial(&denial, &route, &ctx, move |fragment| async move {
                    let mut request = request;
                    request.extensions_mut().insert(fragment);
                    next.run(request).await
                })
                .await
        }
        GateOutcome::PassThrough | GateOutcome::Allowed { .. } => next.run(request).await,
    }
}
