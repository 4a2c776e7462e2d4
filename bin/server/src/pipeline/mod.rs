//! The request pipeline.
//!
//! A pipeline is an ordered list of processors sharing one
//! [`HandlerContext`]. Processors run one after the other; the first one
//! to mark the response ready ends the run and later ones never start.
//!
//! - Zero processors: `204 No Content`
//! - A processor fails: `500` with a generic body, the report is logged
//! - Every processor passes without answering: `501 Not Implemented`

pub mod context;
pub mod processor;
pub mod request;
pub mod response;

pub use context::HandlerContext;
pub use processor::{MethodValidator, Processor};
pub use request::InboundRequest;
pub use response::ResponseBuilder;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::error::ApiError;

/// An ordered chain of processors.
#[derive(Clone, Default)]
pub struct Pipeline {
    processors: Vec<Arc<dyn Processor>>,
}

impl Pipeline {
    /// Creates a pipeline running `processors` in order.
    #[must_use]
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Self {
        Self { processors }
    }

    /// Returns the number of processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if the pipeline has no processors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs the processors against `ctx` and returns the response to send.
    #[tracing::instrument(
        name = "pipeline",
        skip_all,
        fields(method = %ctx.request().method(), path = %ctx.request().path())
    )]
    pub async fn run(&self, mut ctx: HandlerContext) -> Response {
        if self.processors.is_empty() {
            return StatusCode::NO_CONTENT.into_response();
        }

        for processor in &self.processors {
            if let Err(report) = processor.process(&mut ctx).await {
                tracing::error!(
                    processor = processor.name(),
                    error = %report,
                    "processor failed"
                );
                return ApiError::Internal.into_response();
            }

            if ctx.response().is_ready() {
                let response = ctx.into_response();
                tracing::debug!(status = ?response.status(), "response ready");
                return response.into_response();
            }
        }

        tracing::warn!("no processor produced a response");
        StatusCode::NOT_IMPLEMENTED.into_response()
    }
}

/// Wraps a processor for use in a pipeline.
pub fn processor<P: Processor + 'static>(processor: P) -> Arc<dyn Processor> {
    Arc::new(processor)
}
