//! Daemon event subscriptions.
//!
//! Two streams matter: volume lifecycle events, which mean the volume list
//! changed, and container events from this extension's own workers, which
//! mean a backend job started or finished. Both are plain JSON lines from
//! the container engine's `events` command.

mod filter;
mod listener;
mod source;

pub use filter::{EventFilter, LabelFilter};
pub use listener::{EventListener, StreamEnd, Subscription};
pub use source::{EngineEventSource, EventSource, EventStream};
