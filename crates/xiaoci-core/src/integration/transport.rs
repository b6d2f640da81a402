//! Transport seams the adapters are written against.
//!
//! The transport crate builds these; adapters consume them without knowing
//! which HTTP client sits underneath.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TransportResult;

/// A boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Posts a JSON body to `{base_url}/{endpoint}` and returns the decoded
/// response body.
///
/// The closure captures the base URL and any credentials.
pub type PostJsonFn =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, TransportResult<Value>> + Send + Sync>;
