//! The inbound request as processors see it.

use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::http::{HeaderMap, Method, Uri, request::Parts};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A fully buffered request with its matched path parameters.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    body: Bytes,
}

impl InboundRequest {
    /// Creates a request from its pieces.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            params,
            body,
        }
    }

    /// Creates a request from the head of an HTTP request and its body.
    #[must_use]
    pub fn from_parts(parts: Parts, params: HashMap<String, String>, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, params, body)
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the path parameter `name`, if the route declares it.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the query string as ordered key-value pairs, keeping
    /// repeated keys.
    ///
    /// # Errors
    ///
    /// Returns the rejection if the query string is not valid
    /// `application/x-www-form-urlencoded`.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, QueryRejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&self.uri)?;
        Ok(pairs)
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn body_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decoding error if the body is not a `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(uri: &str, body: &'static str) -> InboundRequest {
        InboundRequest::new(
            Method::GET,
            uri.parse().expect("uri"),
            HeaderMap::new(),
            HashMap::from([("username".to_string(), "alice".to_string())]),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn path_excludes_query() {
        let req = request("/root/audit?from=20240101", "");
        assert_eq!(req.path(), "/root/audit");
    }

    #[test]
    fn query_pairs_keep_repeated_keys() {
        let req = request("/root/audit?from=20240101&from=20240102&to=20240131", "");
        let pairs = req.query_pairs().expect("query");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("from".to_string(), "20240101".to_string()));
    }

    #[test]
    fn missing_query_is_empty() {
        let req = request("/root/audit", "");
        assert!(req.query_pairs().expect("query").is_empty());
    }

    #[test]
    fn params_and_headers() {
        let mut req = request("/admin/user/alice/roles", "");
        req.headers
            .insert("session-id", "abc".parse().expect("header value"));
        assert_eq!(req.param("username"), Some("alice"));
        assert_eq!(req.param("group"), None);
        assert_eq!(
            req.headers().get("session-id").map(|value| value.as_bytes()),
            Some(b"abc".as_slice())
        );
    }

    #[test]
    fn json_body_decodes() {
        #[derive(Deserialize)]
        struct Credentials {
            name: String,
        }

        let req = request("/login", r#"{"name":"alice"}"#);
        let credentials: Credentials = req.json().expect("json");
        assert_eq!(credentials.name, "alice");
        assert!(request("/login", "not json").json::<Credentials>().is_err());
    }
}
