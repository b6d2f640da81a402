//! Event dispatcher.
//!
//! ```text
//! frame ─▶ normalize ─▶ DedupKey ─▶ cache.seen? ──yes──▶ Duplicate
//!                                        │ no
//!                                        ▼
//!                         registry.resolve(text) ──none──▶ Unmatched
//!                                        │
//!                                        ▼
//!                              handler(ctx).await
//!                           ok ─▶ Handled    err/panic ─▶ log + diagnostic reply ─▶ Failed
//! ```
//!
//! Nothing raised inside a handler escapes [`Dispatcher::handle`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{Instrument, debug, error, info_span, trace, warn};
use xiaoci_core::{BoxedSender, Event, normalize};

use crate::context::{HandlerContext, MsgType};
use crate::dedup::{DedupCache, DedupKey};
use crate::registry::{HandlerRegistry, Route};

/// Maximum number of characters of an error kept for logs and replies.
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// First line of the reply sent when a handler fails.
pub const DIAGNOSTIC_HEADER: &str = "处理消息时出错啦 😥";

/// What happened to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The key was already in the cache.
    Duplicate,
    /// No handler matched.
    Unmatched,
    /// A handler ran to completion.
    Handled { route: Route },
    /// A handler returned an error or panicked.
    Failed { route: Route, detail: String },
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled { .. })
    }
}

/// Routes normalized events to handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    cache: Arc<DedupCache>,
    sender: BoxedSender,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, cache: Arc<DedupCache>, sender: BoxedSender) -> Self {
        Self {
            registry,
            cache,
            sender,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    /// Empties the dedup cache so previously seen frames dispatch again.
    pub fn clear_dedup_cache(&self) {
        self.cache.clear();
    }

    /// Normalizes and dispatches one raw frame.
    pub async fn handle(&self, frame: &Value) -> DispatchOutcome {
        self.dispatch_event(normalize(frame)).await
    }

    /// Dispatches an already normalized event.
    pub async fn dispatch_event(&self, event: Event) -> DispatchOutcome {
        let key = DedupKey::derive(&event);
        let span = info_span!(
            "dispatch",
            key = %key,
            conversation = %event.conversation(),
        );
        self.dispatch_keyed(event, key).instrument(span).await
    }

    async fn dispatch_keyed(&self, event: Event, key: DedupKey) -> DispatchOutcome {
        if self.cache.seen(&key) {
            debug!("Duplicate event, dropping");
            return DispatchOutcome::Duplicate;
        }

        let msg_type = MsgType::of(&event);
        let Some(resolved) = self.registry.resolve(&event.text) else {
            trace!(msg_type = %msg_type, "No handler matched");
            return DispatchOutcome::Unmatched;
        };

        debug!(route = %resolved.route, msg_type = %msg_type, "Invoking handler");

        let event = Arc::new(event);
        let ctx = HandlerContext {
            msg_type,
            text: event.text.clone(),
            captures: resolved.captures,
            card: event.card.clone(),
            event: event.clone(),
            sender: self.sender.clone(),
            route: resolved.route.clone(),
        };

        let handler = resolved.handler;
        let result = AssertUnwindSafe(async move { handler.call(ctx).await })
            .catch_unwind()
            .await;

        let detail = match result {
            Ok(Ok(())) => {
                return DispatchOutcome::Handled {
                    route: resolved.route,
                };
            }
            Ok(Err(e)) => truncate_chars(&format!("{e:#}"), MAX_ERROR_DETAIL_CHARS),
            Err(payload) => truncate_chars(&panic_message(payload.as_ref()), MAX_ERROR_DETAIL_CHARS),
        };

        error!(route = %resolved.route, error = %detail, "Handler failed");
        self.send_diagnostic(&event, &detail).await;

        DispatchOutcome::Failed {
            route: resolved.route,
            detail,
        }
    }

    async fn send_diagnostic(&self, event: &Event, detail: &str) {
        let text = diagnostic_text(detail);
        if let Err(e) = self
            .sender
            .send_message(event.conversation(), text.into())
            .await
        {
            warn!(error = %e, "Failed to send diagnostic reply");
        }
    }
}

/// The reply sent to a conversation when its handler fails.
pub fn diagnostic_text(detail: &str) -> String {
    format!("{DIAGNOSTIC_HEADER}\n错误详情: {detail}")
}

/// Keeps at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
