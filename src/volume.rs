//! Volume and action data model shared by the directory, the poller and
//! the coordinator.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Size string the backend reports for a volume with no content.
pub const EMPTY_SIZE: &str = "0 B";

/// A volume as last seen in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver", default)]
    pub driver: String,
    #[serde(rename = "Containers", default)]
    pub containers: Vec<String>,
    /// Human-readable size, unknown until computed.
    #[serde(rename = "Size", default)]
    pub size: Option<String>,
    /// Set while a size recomputation is in flight. Never sent by the backend.
    #[serde(skip)]
    pub size_loading: bool,
}

impl Volume {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: "local".to_string(),
            containers: Vec::new(),
            size: None,
            size_loading: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.as_deref() == Some(EMPTY_SIZE)
    }

    /// Actions a consumer may offer for this volume given its current state.
    ///
    /// A volume with an action in flight offers nothing; an empty volume has
    /// nothing to export, transfer, empty, save or push.
    pub fn available_actions(&self, state: &VolumeState) -> Vec<ActionKind> {
        if state.is_in_progress() {
            return Vec::new();
        }
        ActionKind::ALL
            .iter()
            .copied()
            .filter(|kind| !(self.is_empty() && kind.needs_content()))
            .collect()
    }
}

/// Kinds of mutating action this client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Clone,
    Export,
    Import,
    Save,
    Load,
    Push,
    Pull,
    Transfer,
    Empty,
    Delete,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Clone,
        ActionKind::Export,
        ActionKind::Import,
        ActionKind::Save,
        ActionKind::Load,
        ActionKind::Push,
        ActionKind::Pull,
        ActionKind::Transfer,
        ActionKind::Empty,
        ActionKind::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Clone => "clone",
            ActionKind::Export => "export",
            ActionKind::Import => "import",
            ActionKind::Save => "save",
            ActionKind::Load => "load",
            ActionKind::Push => "push",
            ActionKind::Pull => "pull",
            ActionKind::Transfer => "transfer",
            ActionKind::Empty => "empty",
            ActionKind::Delete => "delete",
        }
    }

    /// Whether the action reads existing volume content.
    fn needs_content(self) -> bool {
        matches!(
            self,
            ActionKind::Export
                | ActionKind::Transfer
                | ActionKind::Empty
                | ActionKind::Save
                | ActionKind::Push
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-held marker that a volume has a job running.
///
/// `kind` is an opaque display label; the backend may report kinds this
/// client has no [`ActionKind`] for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: String,
}

impl ActionRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// Capitalized label, e.g. "Export in progress...".
    pub fn describe(&self) -> String {
        let mut chars = self.kind.chars();
        let label = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => "Action".to_string(),
        };
        format!("{} in progress...", label)
    }
}

/// The backend has shipped both `"clone"` and `{"kind": "clone"}` as
/// progress values.
impl<'de> Deserialize<'de> for ActionRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(String),
            Object { kind: String },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(kind) | Wire::Object { kind } => ActionRecord { kind },
        })
    }
}

/// Volume name to in-flight action, as reported by `/progress`.
pub type ActionMap = BTreeMap<String, ActionRecord>;

/// Per-volume state as observed by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeState {
    Idle,
    InProgress(String),
}

impl VolumeState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, VolumeState::InProgress(_))
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeState::Idle => f.write_str("idle"),
            VolumeState::InProgress(kind) => write!(f, "{} in progress", kind),
        }
    }
}

/// Result of `GET /volumes/{name}/size`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VolumeSize {
    #[serde(rename = "Bytes")]
    pub bytes: u64,
    #[serde(rename = "Human", default)]
    pub human: String,
}

impl VolumeSize {
    /// Display string, falling back to formatting `bytes` when the backend
    /// left `Human` empty.
    pub fn display(&self) -> String {
        if self.human.trim().is_empty() {
            bytesize::ByteSize(self.bytes).to_string()
        } else {
            self.human.clone()
        }
    }
}
