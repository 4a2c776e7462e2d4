//! Route registration: pipelines keyed by method and path, served by axum.

use axum::Router;
use axum::extract::{Path, Request};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{Authenticate, Authorize};
use crate::error::ApiError;
use crate::pipeline::{
    HandlerContext, InboundRequest, MethodValidator, Pipeline, Processor, processor,
};
use crate::state::AppState;

/// Largest request body read into a context.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The pipelines registered under one path.
struct Route {
    state: AppState,
    pipelines: Vec<(Method, Pipeline)>,
}

impl Route {
    /// Picks the pipeline for the request method. Without one, the first
    /// pipeline runs so its method validator answers `405`.
    fn pipeline_for(&self, method: &Method) -> Option<&Pipeline> {
        self.pipelines
            .iter()
            .find(|(registered, _)| registered == method)
            .or_else(|| self.pipelines.first())
            .map(|(_, pipeline)| pipeline)
    }

    async fn dispatch(&self, params: HashMap<String, String>, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(error = %err, "unreadable request body");
                return ApiError::BadRequest {
                    reason: "unreadable request body".to_string(),
                }
                .into_response();
            }
        };

        let ctx = HandlerContext::new(
            self.state.clone(),
            InboundRequest::from_parts(parts, params, body),
        );
        match self.pipeline_for(ctx.request().method()) {
            Some(pipeline) => pipeline.run(ctx).await,
            None => Pipeline::default().run(ctx).await,
        }
    }
}

/// Collects pipelines per route and turns them into a [`Router`].
///
/// Every pipeline starts with a [`MethodValidator`] for its method.
pub struct ProcessingEngine {
    state: AppState,
    routes: Vec<(String, Vec<(Method, Pipeline)>)>,
}

impl ProcessingEngine {
    /// Creates an engine with no routes.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            routes: Vec::new(),
        }
    }

    /// Registers `processors` for `method` on `path`.
    ///
    /// `path` uses axum syntax, so `{name}` segments become path
    /// parameters readable through [`InboundRequest::param`].
    #[must_use]
    pub fn add_processors(
        mut self,
        method: Method,
        path: &str,
        processors: Vec<Arc<dyn Processor>>,
    ) -> Self {
        let mut chain = Vec::with_capacity(processors.len() + 1);
        chain.push(processor(MethodValidator::new(method.clone())));
        chain.extend(processors);
        let pipeline = Pipeline::new(chain);

        match self.routes.iter_mut().find(|(registered, _)| registered == path) {
            Some((_, pipelines)) => pipelines.push((method, pipeline)),
            None => self.routes.push((path.to_string(), vec![(method, pipeline)])),
        }
        self
    }

    /// Registers `processors` behind authentication and authorization.
    #[must_use]
    pub fn add_protected(
        self,
        method: Method,
        path: &str,
        processors: Vec<Arc<dyn Processor>>,
    ) -> Self {
        let mut chain = vec![processor(Authenticate), processor(Authorize)];
        chain.extend(processors);
        self.add_processors(method, path, chain)
    }

    /// Builds the router, traced with `tower-http`.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for (path, pipelines) in self.routes {
            tracing::debug!(path = %path, methods = pipelines.len(), "registering route");
            let route = Arc::new(Route {
                state: self.state.clone(),
                pipelines,
            });
            router = router.route(&path, method_router(&path, route));
        }
        router.layer(TraceLayer::new_for_http())
    }
}

fn method_router(path: &str, route: Arc<Route>) -> MethodRouter {
    if path.contains('{') {
        any(
            move |Path(params): Path<HashMap<String, String>>, request: Request| {
                let route = Arc::clone(&route);
                async move { route.dispatch(params, request).await }
            },
        )
    } else {
        any(move |request: Request| {
            let route = Arc::clone(&route);
            async move { route.dispatch(HashMap::new(), request).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::testing;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn echo_param(ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let name = ctx.request().param("name").unwrap_or("nobody").to_string();
        ctx.respond(StatusCode::OK, name);
        Ok(())
    }

    fn engine() -> ProcessingEngine {
        ProcessingEngine::new(testing::memory_state().0)
            .add_processors(Method::GET, "/hello/{name}", vec![processor(echo_param)])
            .add_processors(Method::POST, "/empty", Vec::new())
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn path_parameters_reach_processors() {
        let (status, body) = send(engine().into_router(), Method::GET, "/hello/world").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"world");
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let (status, _) = send(engine().into_router(), Method::DELETE, "/hello/world").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn validator_only_pipeline_is_not_implemented() {
        let (status, _) = send(engine().into_router(), Method::POST, "/empty").await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn same_path_dispatches_by_method() {
        fn created(ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
            ctx.respond(StatusCode::CREATED, "");
            Ok(())
        }

        let router = engine()
            .add_processors(Method::PUT, "/hello/{name}", vec![processor(created)])
            .into_router();
        let (status, _) = send(router, Method::PUT, "/hello/world").await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn protected_route_needs_credentials() {
        let router = engine()
            .add_protected(Method::GET, "/secret", vec![processor(echo_param)])
            .into_router();
        let (status, _) = send(router, Method::GET, "/secret").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
