//! Client-side coordination of long-running volume actions.
//!
//! The backend owns volumes and runs clone/export/import/transfer/empty/
//! delete jobs. This crate mirrors what it reports: a [`VolumeDirectory`]
//! of volumes, an [`ActionCoordinator`] holding the revision-stamped map of
//! actions in flight, and an [`EventListener`] that turns daemon events into
//! refreshes of either.

pub mod backend;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod notify;
pub mod progress;
pub mod session;
pub mod size;
pub mod volume;

pub use backend::{ActionRequest, Backend, FollowUp, HttpBackend};
pub use coordinator::{ActionCoordinator, PollHandle, Reconciled, Snapshot};
pub use directory::{SizeLoad, VolumeDirectory};
pub use error::{FetchError, VolError};
pub use events::{EngineEventSource, EventFilter, EventListener, EventSource, StreamEnd, Subscription};
pub use notify::{Notification, Notifier};
pub use progress::ProgressPoller;
pub use session::{ReconnectPolicy, Session, VolumeRow};
pub use size::SizeReconciler;
pub use volume::{ActionKind, ActionMap, ActionRecord, Volume, VolumeSize, VolumeState};
