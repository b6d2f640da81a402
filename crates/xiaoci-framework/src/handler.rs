//! Handler trait and type erasure.
//!
//! A handler is any async function or closure taking a [`HandlerContext`]
//! and returning [`HandlerResult`]:
//!
//! ```rust,ignore
//! async fn ping(ctx: HandlerContext) -> HandlerResult {
//!     ctx.reply("成功").await?;
//!     Ok(())
//! }
//!
//! registry.on_event("测试").bind(ping);
//! ```

use std::future::Future;
use std::sync::Arc;

pub use xiaoci_core::BoxFuture;

use crate::context::HandlerContext;

/// What every handler returns. Errors are caught by the dispatcher.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// Handler Trait
// ============================================================================

/// An event handler stored in the registry.
///
/// Implemented automatically for `Fn(HandlerContext) -> impl Future<Output =
/// HandlerResult>`.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(ctx))
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn Handler>;

/// Convert a handler function into a boxed handler.
pub fn into_handler<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}
