//! Push service lifecycle: start the API listener (producer) and the relay loop (consumer),
//! stop them with bounded waits, and discard whatever is still queued.

use crate::channels::{
    parse_destination, ChannelHandle, ChannelRegistry, RegistrySender, TelegramChannel,
};
use crate::config::{self, Config};
use crate::gateway::{serve_api, ApiState};
use crate::relay::{
    queue, CallbackReporter, Lifecycle, MessageSender, QueueConsumer, QueueDrain, RelayLoop,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long `terminate` waits for each task before aborting it.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Everything the service needs from configuration, already resolved.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// `host:port` for the push API; port 0 picks a free port.
    pub bind_addr: String,
    pub token: String,
    pub destinations: Vec<String>,
}

/// What `terminate` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminateReport {
    /// Ids of queued requests dropped without processing.
    pub discarded: Vec<String>,
    /// The API listener did not stop within the wait and was aborted.
    pub worker_forced: bool,
    /// The relay loop did not stop within the wait and was aborted.
    pub relay_forced: bool,
}

pub struct PushService {
    settings: ServiceSettings,
    sender: Arc<dyn MessageSender>,
    reporter: CallbackReporter,
    lifecycle: watch::Sender<Lifecycle>,
    shutdown_wait: Duration,
    local_addr: Option<SocketAddr>,
    worker: Option<JoinHandle<Result<()>>>,
    relay: Option<JoinHandle<QueueConsumer>>,
    drain: Option<QueueDrain>,
}

impl PushService {
    pub fn new(settings: ServiceSettings, sender: Arc<dyn MessageSender>) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Created);
        Self {
            settings,
            sender,
            reporter: CallbackReporter::new(),
            lifecycle,
            shutdown_wait: SHUTDOWN_WAIT,
            local_addr: None,
            worker: None,
            relay: None,
            drain: None,
        }
    }

    pub fn with_reporter(mut self, reporter: CallbackReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }

    pub fn state(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Address the push API is bound to, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the API listener and start both tasks. Only valid from `Created`.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state() != Lifecycle::Created {
            anyhow::bail!("push service already started ({:?})", self.state());
        }
        let bind = self.settings.bind_addr.trim().to_string();
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("binding push api to {}", bind))?;
        self.local_addr = Some(listener.local_addr().context("reading listener address")?);

        let (producer, consumer) = queue::channel();
        self.drain = Some(consumer.drain_handle());
        let destinations: Arc<[String]> = self.settings.destinations.clone().into();
        if destinations.is_empty() {
            log::warn!("no destinations configured; pushes will be accepted but not delivered");
        }

        self.lifecycle.send_replace(Lifecycle::Running);

        let relay = RelayLoop::new(
            consumer,
            self.sender.clone(),
            destinations,
            self.reporter.clone(),
            self.lifecycle.subscribe(),
        );
        self.relay = Some(tokio::spawn(relay.run()));

        let state = ApiState {
            token: Arc::from(self.settings.token.as_str()),
            queue: producer,
        };
        let shutdown = wait_until_stopped(self.lifecycle.subscribe());
        self.worker = Some(tokio::spawn(serve_api(listener, state, shutdown)));
        log::info!("push service started");
        Ok(())
    }

    /// Stop both tasks (bounded wait, then abort) and discard queued requests.
    pub async fn terminate(&mut self) -> TerminateReport {
        self.lifecycle.send_replace(Lifecycle::Stopped);
        let mut report = TerminateReport::default();

        if let Some(mut worker) = self.worker.take() {
            match tokio::time::timeout(self.shutdown_wait, &mut worker).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => log::warn!("push api exited with error: {:#}", e),
                Ok(Err(e)) => log::warn!("push api task failed: {}", e),
                Err(_) => {
                    log::warn!("push api did not stop within {:?}, aborting", self.shutdown_wait);
                    worker.abort();
                    report.worker_forced = true;
                }
            }
        }

        if let Some(mut relay) = self.relay.take() {
            match tokio::time::timeout(self.shutdown_wait, &mut relay).await {
                Ok(Ok(_consumer)) => {}
                Ok(Err(e)) => log::warn!("relay task failed: {}", e),
                Err(_) => {
                    log::warn!("relay loop did not stop within {:?}, aborting", self.shutdown_wait);
                    relay.abort();
                    report.relay_forced = true;
                }
            }
        }

        if let Some(drain) = self.drain.take() {
            match tokio::time::timeout(self.shutdown_wait, drain.close_and_drain()).await {
                Ok(discarded) => report.discarded = discarded,
                Err(_) => log::error!("push queue still busy after abort; queued messages lost"),
            }
        }

        if !report.discarded.is_empty() {
            log::warn!(
                "discarded {} queued message(s) on shutdown: {}",
                report.discarded.len(),
                report.discarded.join(", ")
            );
        }
        log::info!("push service stopped");
        report
    }
}

async fn wait_until_stopped(mut lifecycle: watch::Receiver<Lifecycle>) {
    let _ = lifecycle.wait_for(|s| *s == Lifecycle::Stopped).await;
}

/// Build the channel registry from config (Telegram when a bot token is available).
pub async fn build_registry(config: &Config) -> ChannelRegistry {
    let registry = ChannelRegistry::new();
    if let Some(token) = config::resolve_telegram_token(config) {
        let telegram: Arc<dyn ChannelHandle> = Arc::new(TelegramChannel::new(Some(token)));
        registry.register(telegram).await;
        log::info!("telegram channel registered");
    }
    registry
}

/// Run the push relay from config until Ctrl+C / SIGTERM.
/// Generates and persists the API token on first start.
pub async fn run_service(mut config: Config, config_path: PathBuf) -> Result<()> {
    config::ensure_api_token(&mut config, &config_path)?;
    let token = config::resolve_api_token(&config).context("api token missing after generation")?;

    let registry = build_registry(&config).await;
    let destinations = config::resolve_destinations(&config);
    let known = registry.ids().await;
    for dest in &destinations {
        match parse_destination(dest) {
            Some((channel, _)) if known.iter().any(|k| k == channel) => {}
            Some((channel, _)) => {
                log::warn!("destination {} uses channel {} which is not configured", dest, channel)
            }
            None => log::warn!("destination {:?} is not of the form channel:conversation", dest),
        }
    }

    let settings = ServiceSettings {
        bind_addr: config.api.bind_addr(),
        token,
        destinations,
    };
    let mut service = PushService::new(settings, Arc::new(RegistrySender::new(registry)));
    service.initialize().await?;

    shutdown_signal().await;
    log::info!("shutdown signal received, stopping push service");
    let report = service.terminate().await;
    if report.worker_forced || report.relay_forced {
        log::warn!("forced shutdown: {:?}", report);
    }
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::MessageChain;
    use async_trait::async_trait;

    struct NullSender;

    #[async_trait]
    impl MessageSender for NullSender {
        async fn send(&self, _destination: &str, _message: &MessageChain) -> Result<(), String> {
            Ok(())
        }
    }

    fn settings() -> ServiceSettings {
        ServiceSettings {
            bind_addr: "127.0.0.1:0".to_string(),
            token: "t".to_string(),
            destinations: vec!["x:1".to_string()],
        }
    }

    #[tokio::test]
    async fn lifecycle_moves_forward_only() {
        let mut service = PushService::new(settings(), Arc::new(NullSender));
        assert_eq!(service.state(), Lifecycle::Created);
        service.initialize().await.unwrap();
        assert_eq!(service.state(), Lifecycle::Running);
        assert!(service.local_addr().is_some());
        assert!(service.initialize().await.is_err());

        let report = service.terminate().await;
        assert_eq!(service.state(), Lifecycle::Stopped);
        assert_eq!(report, TerminateReport::default());
        assert!(service.initialize().await.is_err());
    }

    #[tokio::test]
    async fn terminate_before_initialize_is_harmless() {
        let mut service = PushService::new(settings(), Arc::new(NullSender));
        let report = service.terminate().await;
        assert_eq!(report, TerminateReport::default());
        assert_eq!(service.state(), Lifecycle::Stopped);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut s = settings();
        s.bind_addr = taken.local_addr().unwrap().to_string();
        let mut service = PushService::new(s, Arc::new(NullSender));
        let err = service.initialize().await.unwrap_err();
        assert!(format!("{:#}", err).contains("binding push api"));
        assert_eq!(service.state(), Lifecycle::Created);
    }

    #[tokio::test]
    async fn registry_has_telegram_only_with_token() {
        if std::env::var("TELEGRAM_BOT_TOKEN").is_ok() {
            return;
        }
        let mut config = Config::default();
        assert!(build_registry(&config).await.ids().await.is_empty());
        config.channels.telegram.bot_token = Some("123:abc".to_string());
        assert_eq!(build_registry(&config).await.ids().await, vec!["telegram".to_string()]);
    }
}
