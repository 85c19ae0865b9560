//! Request boundary for the parameter store.
//!
//! Translates path+payload calls into store operations and typed errors
//! into status-coded responses, independent of the transport carrying
//! them.

use std::sync::Arc;
use serde_json::{json, Value};
use crate::ParameterAccess;

/// A status-coded response at the request boundary.
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: 400,
            body: json!({ "error": message }),
        }
    }
}

/// Dispatches GET/PUT requests to a [`ParameterAccess`] store.
pub struct MetadataAdapter {
    store: Arc<dyn ParameterAccess>,
}

impl MetadataAdapter {
    pub fn new(store: Arc<dyn ParameterAccess>) -> Self {
        Self { store }
    }

    /// Handles a GET for `path`, optionally with descriptive annotations
    /// per leaf.
    pub fn get(&self, path: &str, with_metadata: bool) -> ApiResponse {
        match self.store.get(path, with_metadata) {
            Ok(value) => ApiResponse::ok(value),
            Err(err) => ApiResponse::bad_request(&err.to_string()),
        }
    }

    /// Handles a PUT of a raw JSON payload to `path`.
    ///
    /// On success the response carries the post-set value of `path`, so
    /// the caller observes what the store actually accepted.
    pub fn put(&self, path: &str, payload: &str) -> ApiResponse {
        let data: Value = match serde_json::from_str(payload) {
            Ok(data) => data,
            Err(err) => return ApiResponse::bad_request(&format!("malformed payload: {}", err)),
        };
        match self
            .store
            .set(path, data)
            .and_then(|_| self.store.get(path, false))
        {
            Ok(value) => ApiResponse::ok(value),
            Err(err) => ApiResponse::bad_request(&err.to_string()),
        }
    }
}
