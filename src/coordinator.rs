//! Action-state coordinator.
//!
//! Mirrors the backend's in-progress map into a revision-stamped
//! [`Snapshot`] and decides what to re-fetch when events arrive.
//!
//! Every call to [`ActionCoordinator::refresh_actions`] takes a new revision
//! before it suspends. When the response arrives it is applied only if no
//! higher revision has been applied already, so a slow early poll cannot
//! overwrite a faster later one. Revisions are compared and written under
//! the snapshot channel's lock, which is never held across an await.
//!
//! The coordinator never writes a record itself. Starting an action only
//! sends the request; the volume shows as in progress once a poll says so.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{ActionRequest, Backend};
use crate::directory::VolumeDirectory;
use crate::error::{FetchError, VolError};
use crate::notify::Notifier;
use crate::progress::ProgressPoller;
use crate::volume::{ActionMap, ActionRecord, VolumeState};

/// Locally held copy of all action records, stamped with the revision of
/// the poll that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    revision: u64,
    actions: ActionMap,
}

impl Snapshot {
    /// Revision of the poll this snapshot came from; 0 before any poll.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn actions(&self) -> &ActionMap {
        &self.actions
    }

    pub fn record(&self, volume: &str) -> Option<&ActionRecord> {
        self.actions.get(volume)
    }

    pub fn state_of(&self, volume: &str) -> VolumeState {
        match self.actions.get(volume) {
            Some(record) => VolumeState::InProgress(record.kind.clone()),
            None => VolumeState::Idle,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of one [`ActionCoordinator::refresh_actions`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The response became the current snapshot.
    Applied { revision: u64 },
    /// A later poll had already been applied; the response was dropped.
    Stale { revision: u64, current: u64 },
}

pub struct ActionCoordinator {
    poller: ProgressPoller,
    directory: Arc<VolumeDirectory>,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    next_revision: AtomicU64,
    snapshot: watch::Sender<Arc<Snapshot>>,
}

impl ActionCoordinator {
    pub fn new(
        poller: ProgressPoller,
        directory: Arc<VolumeDirectory>,
        backend: Arc<dyn Backend>,
        notifier: Notifier,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            poller,
            directory,
            backend,
            notifier,
            next_revision: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Last reconciled snapshot. Empty until the first successful poll.
    pub fn current_actions(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn state_of(&self, volume: &str) -> VolumeState {
        self.snapshot.borrow().state_of(volume)
    }

    /// Receiver that sees every applied snapshot, revisions only increasing.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// Poll the backend once and apply the result if it is still the newest.
    ///
    /// On failure the current snapshot stays in force and the error goes
    /// back to the caller. The revision is taken when this is called, not
    /// when the returned future is first polled.
    pub fn refresh_actions(
        &self,
    ) -> impl Future<Output = Result<Reconciled, FetchError>> + Send + '_ {
        let revision = self.next_revision.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let actions = self.poller.fetch_progress().await?;
            Ok(self.apply(revision, actions))
        }
    }

    fn apply(&self, revision: u64, actions: ActionMap) -> Reconciled {
        let mut outcome = Reconciled::Applied { revision };
        self.snapshot.send_if_modified(|current| {
            if revision <= current.revision {
                outcome = Reconciled::Stale {
                    revision,
                    current: current.revision,
                };
                return false;
            }
            *current = Arc::new(Snapshot { revision, actions });
            true
        });

        match outcome {
            Reconciled::Applied { revision } => {
                tracing::debug!(revision, "Applied progress snapshot");
            }
            Reconciled::Stale { revision, current } => {
                tracing::debug!(revision, current, "Discarded stale progress snapshot");
            }
        }
        outcome
    }

    /// Callback for volume lifecycle events: reload the directory.
    ///
    /// Returns immediately; a failure is logged and published as a
    /// notification.
    pub fn on_volume_event(&self) -> JoinHandle<()> {
        let directory = Arc::clone(&self.directory);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = directory.refresh().await {
                tracing::warn!(error = %e, "Volume list refresh failed");
                notifier.error(format!("Failed to refresh volumes: {}", e));
            }
        })
    }

    /// Callback for extension worker events: poll progress again.
    pub fn on_action_event(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.refresh_actions().await {
                tracing::warn!(error = %e, "Progress refresh failed");
                this.notifier
                    .error(format!("Failed to refresh actions in progress: {}", e));
            }
        })
    }

    /// Send a mutating request to the backend.
    ///
    /// Nothing is recorded locally: the volume shows as in progress only
    /// once a later poll reports it.
    pub async fn initiate_action(&self, volume: &str, request: &ActionRequest) -> Result<(), VolError> {
        request.validate(volume)?;
        tracing::info!(volume = %volume, action = %request.kind(), "Requesting action");
        self.backend.submit(volume, request).await?;
        Ok(())
    }

    /// Poll progress every `every` until the handle is cancelled or dropped.
    ///
    /// Failed polls are logged and the loop carries on.
    pub fn start_polling(self: &Arc<Self>, every: Duration) -> PollHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let this = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; callers poll once at startup.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = this.refresh_actions().await {
                            tracing::warn!(error = %e, "Periodic progress poll failed");
                        }
                    }
                }
            }
            tracing::debug!("Periodic progress polling stopped");
        });

        PollHandle { token, task }
    }
}

/// Handle to a periodic poll loop. Dropping it stops the loop.
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the loop to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(revision: u64, entries: &[(&str, &str)]) -> Snapshot {
        Snapshot {
            revision,
            actions: entries
                .iter()
                .map(|(v, k)| (v.to_string(), ActionRecord::new(*k)))
                .collect(),
        }
    }

    #[test]
    fn default_snapshot_is_empty_and_idle() {
        let snap = Snapshot::default();
        assert_eq!(snap.revision(), 0);
        assert!(snap.is_empty());
        assert_eq!(snap.state_of("anything"), VolumeState::Idle);
    }

    #[test]
    fn state_of_reports_kind() {
        let snap = snapshot(3, &[("vol-a", "export")]);
        assert_eq!(snap.state_of("vol-a"), VolumeState::InProgress("export".into()));
        assert_eq!(snap.state_of("vol-b"), VolumeState::Idle);
        assert_eq!(snap.record("vol-a").map(|r| r.kind.as_str()), Some("export"));
    }
}
