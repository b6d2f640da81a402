//! # Xiaoci Framework
//!
//! Routing and dispatch on top of `xiaoci-core`.
//!
//! - [`pattern`]: registration-time classification into command, regex or
//!   global
//! - [`registry`]: the three-tier route table behind an atomic swap
//! - [`dedup`]: dedup key derivation and the bounded FIFO cache
//! - [`dispatcher`]: normalize, dedup, route and invoke with failure
//!   isolation
//!
//! ```rust,ignore
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.on_event("测试").bind(|ctx: HandlerContext| async move {
//!     ctx.reply("成功").await?;
//!     Ok(())
//! });
//!
//! let dispatcher = Dispatcher::new(registry, Arc::new(DedupCache::default()), sender);
//! dispatcher.handle(&frame).await;
//! ```

pub mod context;
pub mod dedup;
pub mod dispatcher;
pub mod handler;
pub mod pattern;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_util;

pub use context::{Captures, HandlerContext, MsgType};
pub use dedup::{DEFAULT_CAPACITY, DedupCache, DedupKey, KeySource};
pub use dispatcher::{DispatchOutcome, Dispatcher, diagnostic_text, truncate_chars};
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerResult, into_handler};
pub use pattern::{CompiledPattern, Pattern, Registration, classify};
pub use registry::{EventHandle, HandlerRegistry, Resolved, Route, RouteTable};
