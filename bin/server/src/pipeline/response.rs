//! The outbound response, built up across processors.
//!
//! A response is `Pending` until some processor marks it ready. Headers
//! may be set while pending (the authentication processor sets the renewed
//! token this way) and are kept when the response is marked ready.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResponseState {
    Pending,
    Ready { status: StatusCode, body: Vec<u8> },
}

/// Response under construction.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    headers: HeaderMap,
    state: ResponseState,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            state: ResponseState::Pending,
        }
    }
}

impl ResponseBuilder {
    /// Creates a pending response with no headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing previous values.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns the headers set so far.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets status and body, merges `headers` over those already set and
    /// marks the response ready.
    pub fn mark_ready(&mut self, status: StatusCode, body: impl Into<Vec<u8>>, headers: HeaderMap) {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self.state = ResponseState::Ready {
            status,
            body: body.into(),
        };
    }

    /// Marks the response ready with a status and a plain body.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.mark_ready(status, body, HeaderMap::new());
    }

    /// Marks the response ready with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the encoding error, leaving the response untouched.
    pub fn respond_json<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.mark_ready(status, body, headers);
        Ok(())
    }

    /// Marks the response ready with the status and message of `err`.
    pub fn reject(&mut self, err: &ApiError) {
        self.respond(err.status(), err.message());
    }

    /// Returns true once a processor has marked the response ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ResponseState::Ready { .. })
    }

    /// Returns the status, if ready.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match &self.state {
            ResponseState::Ready { status, .. } => Some(*status),
            ResponseState::Pending => None,
        }
    }

    /// Returns the body, if ready.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        match &self.state {
            ResponseState::Ready { body, .. } => Some(body.as_slice()),
            ResponseState::Pending => None,
        }
    }

    /// Drops headers and content and returns to `Pending`.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.state = ResponseState::Pending;
    }
}

impl IntoResponse for ResponseBuilder {
    /// A pending response converts to an empty `501 Not Implemented`.
    fn into_response(self) -> Response {
        match self.state {
            ResponseState::Ready { status, body } => {
                (status, self.headers, Body::from(body)).into_response()
            }
            ResponseState::Pending => StatusCode::NOT_IMPLEMENTED.into_response(),
        }
    }
}
