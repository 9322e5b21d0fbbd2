//! Wiring for one client session.
//!
//! A [`Session`] builds the directory, poller, coordinator, size reconciler
//! and event listener once and hands out references, so consumers share a
//! single view of every volume.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{ActionRequest, Backend, FollowUp, HttpBackend};
use crate::config::VolkeeperConfig;
use crate::coordinator::ActionCoordinator;
use crate::directory::VolumeDirectory;
use crate::error::VolError;
use crate::events::{EngineEventSource, EventFilter, EventListener, EventSource, StreamEnd, Subscription};
use crate::notify::Notifier;
use crate::progress::ProgressPoller;
use crate::size::SizeReconciler;
use crate::volume::{ActionKind, Volume, VolumeSize, VolumeState};

/// Delay before the first reconnection attempt.
const RECONNECT_INITIAL: Duration = Duration::from_secs(1);

/// A volume together with what is happening to it and what can be done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRow {
    pub volume: Volume,
    pub state: VolumeState,
    pub actions: Vec<ActionKind>,
}

/// When to restart a closed event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            initial: RECONNECT_INITIAL,
            max: RECONNECT_INITIAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Volumes,
    Actions,
}

pub struct Session {
    directory: Arc<VolumeDirectory>,
    coordinator: Arc<ActionCoordinator>,
    sizes: SizeReconciler,
    listener: EventListener,
    notifier: Notifier,
    reconnect: ReconnectPolicy,
    poll_interval: Option<Duration>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, source: Arc<dyn EventSource>, config: &VolkeeperConfig) -> Self {
        let notifier = Notifier::new();
        let directory = Arc::new(VolumeDirectory::new(Arc::clone(&backend)));
        let poller = ProgressPoller::new(Arc::clone(&backend));
        let coordinator = Arc::new(ActionCoordinator::new(
            poller,
            Arc::clone(&directory),
            Arc::clone(&backend),
            notifier.clone(),
        ));
        let sizes = SizeReconciler::new(backend, Arc::clone(&directory));
        let listener = EventListener::new(
            source,
            EventFilter::volumes(),
            EventFilter::extension_workers(&config.events.project_label, &config.events.refresh_label),
        );

        Self {
            directory,
            coordinator,
            sizes,
            listener,
            notifier,
            reconnect: ReconnectPolicy {
                enabled: config.events.reconnect,
                initial: RECONNECT_INITIAL,
                max: config.events.reconnect_max(),
            },
            poll_interval: config.poll.interval(),
        }
    }

    /// Session against the HTTP backend and the engine CLI named in `config`.
    pub fn from_config(config: &VolkeeperConfig) -> Result<Self, VolError> {
        let backend = HttpBackend::new(&config.backend.url, config.backend.timeout())?;
        let source = EngineEventSource::new(config.events.engine.clone());
        Ok(Self::new(Arc::new(backend), Arc::new(source), config))
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_poll_interval(mut self, every: Option<Duration>) -> Self {
        self.poll_interval = every;
        self
    }

    pub fn directory(&self) -> &Arc<VolumeDirectory> {
        &self.directory
    }

    pub fn coordinator(&self) -> &Arc<ActionCoordinator> {
        &self.coordinator
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Load the volume list and the progress map for the first time.
    pub async fn bootstrap(&self) -> Result<(), VolError> {
        let (volumes, actions) = tokio::join!(self.directory.refresh(), self.coordinator.refresh_actions());
        volumes?;
        actions?;
        Ok(())
    }

    /// Current volumes in directory order, joined with the action snapshot.
    pub fn rows(&self) -> Vec<VolumeRow> {
        let snapshot = self.coordinator.current_actions();
        self.directory
            .list()
            .into_iter()
            .map(|volume| {
                let state = snapshot.state_of(&volume.name);
                let actions = volume.available_actions(&state);
                VolumeRow { volume, state, actions }
            })
            .collect()
    }

    /// Request an action and run its follow-up once the backend accepts it.
    ///
    /// Outcomes are published as notifications as well as returned.
    pub async fn perform(&self, volume: &str, request: &ActionRequest) -> Result<(), VolError> {
        let kind = request.kind();
        if let Err(e) = self.coordinator.initiate_action(volume, request).await {
            self.notifier
                .error(format!("Failed to {} volume {}: {}", kind, volume, e));
            return Err(e);
        }
        self.notifier
            .info(format!("Requested {} of volume {}", kind, volume));

        match request.follow_up() {
            FollowUp::None => Ok(()),
            FollowUp::RefreshDirectory => self.directory.refresh().await.map_err(|e| {
                self.notifier.error(format!("Failed to refresh volumes: {}", e));
                e.into()
            }),
            FollowUp::RecomputeSize => self.recompute_size(volume).await.map(|_| ()),
        }
    }

    pub async fn recompute_size(&self, volume: &str) -> Result<VolumeSize, VolError> {
        self.sizes.recompute_size(volume).await.map_err(|e| {
            self.notifier
                .error(format!("Failed to recalculate size of volume {}: {}", volume, e));
            e.into()
        })
    }

    /// Keep both event subscriptions, and periodic polling if configured,
    /// running until `shutdown` is cancelled.
    ///
    /// Returns as soon as either stream cannot be opened the first time,
    /// cancelling the other one, or once both streams have closed with
    /// reconnection disabled.
    pub async fn run_live(&self, shutdown: CancellationToken) -> Result<(), VolError> {
        let polling = self.poll_interval.map(|every| self.coordinator.start_polling(every));

        let supervised = tokio::try_join!(
            self.supervise(Stream::Volumes, shutdown.clone()),
            self.supervise(Stream::Actions, shutdown.clone()),
        );

        if let Some(handle) = polling {
            handle.stop().await;
        }
        supervised.map(|_| ())
    }

    fn subscribe(&self, stream: Stream, saw_events: Arc<AtomicBool>) -> Result<Subscription, VolError> {
        let coordinator = Arc::clone(&self.coordinator);
        match stream {
            Stream::Volumes => self.listener.subscribe_volume_events(move |_line| {
                saw_events.store(true, Ordering::SeqCst);
                let _ = coordinator.on_volume_event();
            }),
            Stream::Actions => self.listener.subscribe_action_events(move |_line| {
                saw_events.store(true, Ordering::SeqCst);
                let _ = coordinator.on_action_event();
            }),
        }
    }

    /// Catch up on whatever a dropped stream may have missed.
    fn resync(&self, stream: Stream) {
        match stream {
            Stream::Volumes => {
                let _ = self.coordinator.on_volume_event();
            }
            Stream::Actions => {
                let _ = self.coordinator.on_action_event();
            }
        }
    }

    async fn supervise(&self, stream: Stream, shutdown: CancellationToken) -> Result<(), VolError> {
        let mut delay = self.reconnect.initial;
        let mut attempt: u32 = 0;

        loop {
            let saw_events = Arc::new(AtomicBool::new(false));
            let subscription = match self.subscribe(stream, Arc::clone(&saw_events)) {
                Ok(subscription) => subscription,
                Err(e) if attempt == 0 || !self.reconnect.enabled => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, retry_in = ?delay, "Could not reopen event stream");
                    if !self.backoff(&shutdown, &mut delay).await {
                        return Ok(());
                    }
                    attempt += 1;
                    continue;
                }
            };
            if attempt > 0 {
                tracing::info!(stream = %subscription.name(), attempt, "Event stream reopened");
                self.resync(stream);
            }
            attempt += 1;

            let end = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                end = subscription.closed() => end,
            };

            let err = match end {
                StreamEnd::Cancelled => return Ok(()),
                StreamEnd::Closed(err) => err,
            };
            if !self.reconnect.enabled {
                self.notifier.error(format!("Live updates stopped: {}", err));
                return Ok(());
            }
            if saw_events.load(Ordering::SeqCst) {
                delay = self.reconnect.initial;
            }
            tracing::warn!(error = %err, retry_in = ?delay, "Event stream lost, reconnecting");
            if !self.backoff(&shutdown, &mut delay).await {
                return Ok(());
            }
        }
    }

    /// Sleep for `delay`, then double it up to the policy maximum.
    /// Returns false if shutdown arrived first.
    async fn backoff(&self, shutdown: &CancellationToken, delay: &mut Duration) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = tokio::time::sleep(*delay) => {}
        }
        *delay = (*delay * 2).min(self.reconnect.max);
        true
    }
}
