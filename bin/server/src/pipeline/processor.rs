//! The processor abstraction and the method validator.

use async_trait::async_trait;
use axum::http::Method;

use super::context::HandlerContext;
use crate::error::{ApiError, PipelineError};

/// One step of a pipeline.
///
/// A processor either leaves the response pending, letting the next one
/// run, or marks it ready, ending the pipeline. Returning an error is
/// reserved for faults that leave no meaningful response to give.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Handles the request held by `ctx`.
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError>;

    /// Returns a name for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F> Processor for F
where
    F: Fn(&mut HandlerContext) -> warden_core::Result<(), PipelineError> + Send + Sync,
{
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        (self)(ctx)
    }
}

/// Answers `405 Method Not Allowed` unless the request uses `method`.
#[derive(Debug, Clone)]
pub struct MethodValidator {
    method: Method,
}

impl MethodValidator {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

#[async_trait]
impl Processor for MethodValidator {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        if *ctx.request().method() != self.method {
            ctx.reject(ApiError::MethodNotAllowed);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "method-validator"
    }
}
