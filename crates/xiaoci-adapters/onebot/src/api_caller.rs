//! How OneBot API calls reach the gateway.
//!
//! [`OneBotSender`](crate::sender::OneBotSender) holds an `Arc<dyn ApiCaller>`
//! and never sees the transport. The HTTP caller posts the parameters as the
//! request body to `{api_url}/{action}`; the response body is the OneBot
//! envelope:
//!
//! ```json
//! {"status": "ok", "retcode": 0, "data": {"message_id": 123}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use xiaoci_core::{ApiError, ApiResult, PostJsonFn};

/// Transport-specific API call mechanism.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Calls `action` and returns the `data` field of a successful response.
    ///
    /// # Errors
    /// [`ApiError::Rejected`] for a non-zero `retcode`, otherwise whatever the
    /// transport reports.
    async fn call(&self, action: &str, params: Value) -> ApiResult<Value>;
}

/// Unwraps a OneBot response envelope.
///
/// A missing `retcode` with no `status: "failed"` counts as success, since
/// some gateways answer plain data.
pub fn unwrap_response(response: Value) -> ApiResult<Value> {
    let retcode = response.get("retcode").and_then(Value::as_i64).unwrap_or(0);
    let failed = response.get("status").and_then(Value::as_str) == Some("failed");

    if retcode != 0 || failed {
        let message = ["wording", "message", "msg"]
            .iter()
            .find_map(|k| response.get(*k).and_then(Value::as_str))
            .filter(|m| !m.is_empty())
            .unwrap_or("request failed")
            .to_string();
        return Err(ApiError::Rejected { retcode, message });
    }

    Ok(response.get("data").cloned().unwrap_or(Value::Null))
}

// =============================================================================
// HttpApiCaller
// =============================================================================

/// [`ApiCaller`] over the transport's JSON poster.
pub struct HttpApiCaller {
    post_json: PostJsonFn,
    api_timeout: Duration,
}

impl HttpApiCaller {
    pub fn new(post_json: PostJsonFn) -> Self {
        Self {
            post_json,
            api_timeout: Duration::from_secs(30),
        }
    }

    /// Upper bound for one call, on top of any client-level timeout.
    pub fn with_timeout(mut self, api_timeout: Duration) -> Self {
        self.api_timeout = api_timeout;
        self
    }
}

#[async_trait]
impl ApiCaller for HttpApiCaller {
    async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
        debug!(action = %action, "Calling OneBot API via HTTP");

        let response = timeout(self.api_timeout, (self.post_json)(action.to_string(), params))
            .await
            .map_err(|_| ApiError::Timeout)??;

        unwrap_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use xiaoci_core::{BoxFuture, TransportError, TransportResult};

    type Reply = BoxFuture<'static, TransportResult<Value>>;

    #[test]
    fn test_unwrap_ok_response() {
        let data = unwrap_response(json!({"status": "ok", "retcode": 0, "data": {"message_id": 5}}))
            .unwrap();
        assert_eq!(data["message_id"], 5);
    }

    #[test]
    fn test_unwrap_rejected_response() {
        let err = unwrap_response(json!({"status": "failed", "retcode": 1200, "wording": "群不存在"}))
            .unwrap_err();
        match err {
            ApiError::Rejected { retcode, message } => {
                assert_eq!(retcode, 1200);
                assert_eq!(message, "群不存在");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = unwrap_response(json!({"status": "failed"})).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { retcode: 0, .. }));
    }

    #[tokio::test]
    async fn test_http_caller_posts_to_action_endpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let post: PostJsonFn = Arc::new(move |endpoint: String, body: Value| -> Reply {
            log.lock().push((endpoint, body));
            Box::pin(async { Ok(json!({"retcode": 0, "data": {"message_id": 9}})) })
        });

        let caller = HttpApiCaller::new(post);
        let data = caller.call("send_msg", json!({"group_id": 1})).await.unwrap();
        assert_eq!(data["message_id"], 9);

        let seen = seen.lock();
        assert_eq!(seen[0].0, "send_msg");
        assert_eq!(seen[0].1["group_id"], 1);
    }

    #[tokio::test]
    async fn test_http_caller_maps_transport_errors() {
        let post: PostJsonFn = Arc::new(|_: String, _: Value| -> Reply {
            Box::pin(async { Err(TransportError::SendFailed("connection reset".into())) })
        });
        let err = HttpApiCaller::new(post)
            .call("send_msg", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::SendFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_caller_times_out() {
        let post: PostJsonFn =
            Arc::new(|_: String, _: Value| -> Reply { Box::pin(std::future::pending()) });
        let err = HttpApiCaller::new(post)
            .with_timeout(Duration::from_secs(1))
            .call("send_msg", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
    }
}
