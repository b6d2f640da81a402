//! Runtime orchestration.
//!
//! [`XiaociRuntime`] owns the pieces that live for the whole process: the
//! validated config, the handler registry, the dedup cache and the
//! shutdown token. [`run`](XiaociRuntime::run) wires them into a
//! [`Dispatcher`] and a [`Supervisor`] and blocks until shutdown.
//!
//! ```rust,ignore
//! let runtime = XiaociRuntime::builder()
//!     .config_file("xiaoci.toml")
//!     .build()?;
//!
//! runtime.on_event("测试").bind(|ctx: HandlerContext| async move {
//!     ctx.reply("成功").await?;
//!     Ok(())
//! });
//!
//! runtime.run().await?;
//! ```
//!
//! Clients come from cargo features unless overridden:
//!
//! | Concern | Override | Feature |
//! |---------|----------|---------|
//! | inbound link | [`with_connector`](XiaociRuntime::with_connector) | `ws-client` |
//! | outbound API | [`with_sender`](XiaociRuntime::with_sender) | `http-client` |

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use xiaoci_core::BoxedSender;
use xiaoci_framework::{DedupCache, Dispatcher, EventHandle, HandlerRegistry, Pattern};
use xiaoci_transport::{Connector, Supervisor};

use crate::config::{ConfigLoader, ConfigResult, XiaociConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The process-wide runtime.
pub struct XiaociRuntime {
    config: XiaociConfig,
    registry: Arc<HandlerRegistry>,
    cache: Arc<DedupCache>,
    connector: Option<Arc<dyn Connector>>,
    sender: Option<BoxedSender>,
    shutdown: CancellationToken,
}

impl XiaociRuntime {
    /// Creates a runtime from an already loaded config.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Config`] if the config fails validation.
    pub fn from_config(config: XiaociConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        let cache = Arc::new(DedupCache::new(config.dedup.capacity));
        Ok(Self {
            config,
            registry: Arc::new(HandlerRegistry::new()),
            cache,
            connector: None,
            sender: None,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &XiaociConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Shorthand for `registry().on_event(pattern)`.
    pub fn on_event(&self, pattern: impl Into<Pattern>) -> EventHandle<'_> {
        self.registry.on_event(pattern)
    }

    /// Shorthand for `registry().on_any()`.
    pub fn on_any(&self) -> EventHandle<'_> {
        self.registry.on_any()
    }

    /// A cloneable handle for handlers that manage the runtime.
    pub fn admin(&self) -> AdminHandle {
        AdminHandle {
            cache: self.cache.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn clear_dedup_cache(&self) {
        self.cache.clear();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Replaces the inbound link.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replaces the outbound sender.
    pub fn with_sender(mut self, sender: BoxedSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Builds a dispatcher over this runtime's registry and cache.
    pub fn dispatcher(&self) -> RuntimeResult<Dispatcher> {
        let sender = match &self.sender {
            Some(sender) => sender.clone(),
            None => self.default_sender()?,
        };
        Ok(Dispatcher::new(
            self.registry.clone(),
            self.cache.clone(),
            sender,
        ))
    }

    #[cfg(feature = "http-client")]
    fn default_sender(&self) -> RuntimeResult<BoxedSender> {
        use xiaoci_adapter_onebot::{HttpApiCaller, OneBotSender};
        use xiaoci_transport::{HttpClientConfig, http_post_json};

        let api = &self.config.api;
        let post_json = http_post_json(
            HttpClientConfig::new(&api.url)
                .with_access_token(api.access_token.clone())
                .with_timeout(api.timeout()),
        )?;
        let caller = HttpApiCaller::new(post_json).with_timeout(api.timeout());
        let sender =
            OneBotSender::new(Arc::new(caller)).with_forward_style(self.config.forward.clone());
        Ok(Arc::new(sender))
    }

    #[cfg(not(feature = "http-client"))]
    fn default_sender(&self) -> RuntimeResult<BoxedSender> {
        Err(RuntimeError::MissingCapability("message sender (http-client)"))
    }

    fn connector(&self) -> RuntimeResult<Arc<dyn Connector>> {
        if let Some(connector) = &self.connector {
            return Ok(connector.clone());
        }
        self.default_connector()
    }

    #[cfg(feature = "ws-client")]
    fn default_connector(&self) -> RuntimeResult<Arc<dyn Connector>> {
        let connection = &self.config.connection;
        Ok(Arc::new(
            xiaoci_transport::WsConnector::new(&connection.url)
                .with_access_token(connection.access_token.clone()),
        ))
    }

    #[cfg(not(feature = "ws-client"))]
    fn default_connector(&self) -> RuntimeResult<Arc<dyn Connector>> {
        Err(RuntimeError::MissingCapability("connector (ws-client)"))
    }

    /// Initializes logging from config and runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        logging::init_from_config(&self.config.logging);
        info!("Xiaoci runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_signal()).await
    }

    /// Runs until `shutdown` completes or the shutdown token is cancelled.
    ///
    /// A frame already being dispatched is finished before returning.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let dispatcher = self.dispatcher()?;
        let supervisor = Supervisor::new(self.connector()?, dispatcher)
            .with_reconnect_delay(self.config.connection.reconnect_delay())
            .with_shutdown(self.shutdown.clone());

        let token = self.shutdown.clone();
        let trigger = async move {
            tokio::select! {
                _ = shutdown => token.cancel(),
                _ = token.cancelled() => {}
            }
        };

        let routes = self.registry.snapshot();
        info!(
            commands = routes.command_count(),
            regexes = routes.regex_count(),
            globals = routes.global_count(),
            dedup_capacity = self.cache.capacity(),
            "Runtime started"
        );
        tokio::join!(supervisor.run(), trigger);
        info!("Runtime stopped");
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, use the shutdown token instead");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// AdminHandle
// =============================================================================

/// Runtime controls that handlers can capture.
#[derive(Clone)]
pub struct AdminHandle {
    cache: Arc<DedupCache>,
    shutdown: CancellationToken,
}

impl AdminHandle {
    /// Forgets every remembered dedup key.
    pub fn clear_dedup_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "Dedup cache cleared by admin");
    }

    pub fn dedup_len(&self) -> usize {
        self.cache.len()
    }

    /// Stops the runtime after the current frame.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads config through a [`ConfigLoader`] and builds the runtime.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: XiaociConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the config only.
    pub fn load(self) -> ConfigResult<XiaociConfig> {
        self.config_loader.load()
    }

    pub fn build(self) -> RuntimeResult<XiaociRuntime> {
        XiaociRuntime::from_config(self.load()?)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Notify;
    use xiaoci_core::{
        ApiResult, Conversation, Message, MessageAck, MessageSender, TransportError,
        TransportResult,
    };
    use xiaoci_framework::{HandlerContext, HandlerResult};
    use xiaoci_transport::FrameSource;

    use crate::config::ConfigError;

    #[derive(Default)]
    struct NotifyingSender {
        sent: Mutex<Vec<(Conversation, String)>>,
        notify: Notify,
    }

    #[async_trait]
    impl MessageSender for NotifyingSender {
        async fn send_message(&self, target: Conversation, message: Message) -> ApiResult<MessageAck> {
            self.sent.lock().push((target, message.plain_text()));
            self.notify.notify_one();
            Ok(MessageAck::default())
        }
    }

    impl NotifyingSender {
        async fn wait_for(&self, count: usize) {
            while self.sent.lock().len() < count {
                self.notify.notified().await;
            }
        }
    }

    struct QueueSource(VecDeque<String>);

    #[async_trait]
    impl FrameSource for QueueSource {
        async fn next_frame(&mut self) -> TransportResult<Option<String>> {
            match self.0.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None => std::future::pending().await,
            }
        }
    }

    /// Serves its frames once, then refuses.
    struct OnceConnector(Mutex<Option<Vec<String>>>);

    #[async_trait]
    impl Connector for OnceConnector {
        async fn connect(&self) -> TransportResult<Box<dyn FrameSource>> {
            match self.0.lock().take() {
                Some(frames) => Ok(Box::new(QueueSource(frames.into()))),
                None => Err(TransportError::ConnectionFailed {
                    url: self.endpoint(),
                    reason: "already used".into(),
                }),
            }
        }

        fn endpoint(&self) -> String {
            "once://test".into()
        }
    }

    fn frame(id: i64, user_id: i64, text: &str) -> String {
        json!({
            "self_id": 1000,
            "user_id": user_id,
            "message_id": id,
            "message_type": "group",
            "group_id": 77,
            "message": [{"type": "text", "data": {"text": text}}]
        })
        .to_string()
    }

    async fn reply_success(ctx: HandlerContext) -> HandlerResult {
        ctx.reply("成功").await?;
        Ok(())
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = XiaociConfig::default();
        config.dedup.capacity = 0;
        let err = XiaociRuntime::from_config(config).err().unwrap();
        assert!(matches!(err, RuntimeError::Config(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_cache_uses_configured_capacity() {
        let mut config = XiaociConfig::default();
        config.dedup.capacity = 64;
        let runtime = XiaociRuntime::from_config(config).unwrap();
        assert_eq!(runtime.cache.capacity(), 64);
    }

    #[test]
    fn test_admin_handle_clears_and_stops() {
        let runtime = XiaociRuntime::from_config(XiaociConfig::default()).unwrap();
        let admin = runtime.admin();
        let key = xiaoci_framework::DedupKey::derive(&xiaoci_core::Event {
            native_id: Some(1),
            ..Default::default()
        });
        runtime.cache.seen(&key);
        assert_eq!(admin.dedup_len(), 1);

        admin.clear_dedup_cache();
        assert_eq!(admin.dedup_len(), 0);

        admin.shutdown();
        assert!(runtime.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_run_until_dispatches_frames_in_order() {
        let sender = Arc::new(NotifyingSender::default());
        let frames = vec![
            frame(1, 2000, "测试"),
            frame(1, 2000, "测试"),
            frame(2, 1000, "测试"),
            frame(3, 2000, "你好"),
        ];
        let runtime = XiaociRuntime::from_config(XiaociConfig::default())
            .unwrap()
            .with_connector(Arc::new(OnceConnector(Mutex::new(Some(frames)))))
            .with_sender(sender.clone());
        runtime.on_event("测试").bind(reply_success);
        runtime.on_event("你好").bind(|ctx: HandlerContext| async move {
            ctx.reply("你好呀").await?;
            HandlerResult::Ok(())
        });

        let waiter = sender.clone();
        runtime
            .run_until(async move { waiter.wait_for(2).await })
            .await
            .unwrap();

        let sent = sender.sent.lock();
        let texts: Vec<_> = sent.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(texts, vec!["成功", "你好呀"]);
        assert_eq!(sent[0].0, Conversation::group(77));
        assert!(runtime.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_admin_shutdown_ends_run() {
        let sender = Arc::new(NotifyingSender::default());
        let runtime = XiaociRuntime::from_config(XiaociConfig::default())
            .unwrap()
            .with_connector(Arc::new(OnceConnector(Mutex::new(Some(vec![frame(
                9, 2000, "关机",
            )])))))
            .with_sender(sender.clone());
        let admin = runtime.admin();
        runtime.on_event("关机").bind(move |ctx: HandlerContext| {
            let admin = admin.clone();
            async move {
                ctx.reply("再见").await?;
                admin.shutdown();
                HandlerResult::Ok(())
            }
        });

        runtime
            .run_until(std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(sender.sent.lock().len(), 1);
    }

    #[cfg(not(feature = "http-client"))]
    #[test]
    fn test_missing_sender_capability() {
        let runtime = XiaociRuntime::from_config(XiaociConfig::default()).unwrap();
        assert!(matches!(
            runtime.dispatcher(),
            Err(RuntimeError::MissingCapability(_))
        ));
    }
}
