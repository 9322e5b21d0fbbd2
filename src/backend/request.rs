use reqwest::Method;

use crate::error::VolError;
use crate::volume::ActionKind;

/// A mutating job to request from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Clone { dest_volume: String },
    Export { path: String },
    Import { path: String },
    Save { image: String },
    Load { image: String },
    Push { reference: String },
    Pull { reference: String },
    Transfer { dest_host: String, dest_volume: String },
    Empty,
    Delete,
}

/// What a consumer should reload once a request has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    None,
    RefreshDirectory,
    RecomputeSize,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Clone { .. } => ActionKind::Clone,
            ActionRequest::Export { .. } => ActionKind::Export,
            ActionRequest::Import { .. } => ActionKind::Import,
            ActionRequest::Save { .. } => ActionKind::Save,
            ActionRequest::Load { .. } => ActionKind::Load,
            ActionRequest::Push { .. } => ActionKind::Push,
            ActionRequest::Pull { .. } => ActionKind::Pull,
            ActionRequest::Transfer { .. } => ActionKind::Transfer,
            ActionRequest::Empty => ActionKind::Empty,
            ActionRequest::Delete => ActionKind::Delete,
        }
    }

    pub(crate) fn method(&self) -> Method {
        match self {
            ActionRequest::Export { .. }
            | ActionRequest::Import { .. }
            | ActionRequest::Save { .. }
            | ActionRequest::Load { .. } => Method::GET,
            _ => Method::POST,
        }
    }

    /// Query parameters appended to `/volumes/{name}/{kind}`.
    pub(crate) fn query(&self) -> Vec<(&'static str, &str)> {
        match self {
            ActionRequest::Clone { dest_volume } => vec![("destVolume", dest_volume)],
            ActionRequest::Export { path } | ActionRequest::Import { path } => vec![("path", path)],
            ActionRequest::Save { image } | ActionRequest::Load { image } => vec![("image", image)],
            ActionRequest::Transfer {
                dest_host,
                dest_volume,
            } => vec![("destHost", dest_host), ("destVolume", dest_volume)],
            _ => Vec::new(),
        }
    }

    /// JSON body, for the requests that carry one.
    pub(crate) fn body(&self) -> Option<serde_json::Value> {
        match self {
            ActionRequest::Push { reference } | ActionRequest::Pull { reference } => {
                Some(serde_json::json!({ "reference": reference }))
            }
            _ => None,
        }
    }

    pub fn follow_up(&self) -> FollowUp {
        match self {
            ActionRequest::Clone { .. } | ActionRequest::Delete | ActionRequest::Pull { .. } => {
                FollowUp::RefreshDirectory
            }
            ActionRequest::Import { .. } | ActionRequest::Load { .. } | ActionRequest::Empty => {
                FollowUp::RecomputeSize
            }
            _ => FollowUp::None,
        }
    }

    /// Reject requests the backend would bounce with a 400.
    pub fn validate(&self, volume: &str) -> Result<(), VolError> {
        if volume.trim().is_empty() {
            return Err(VolError::InvalidRequest("volume name is required".into()));
        }
        let missing = match self {
            ActionRequest::Clone { dest_volume } if dest_volume.trim().is_empty() => Some("destination volume"),
            ActionRequest::Clone { dest_volume } if dest_volume == volume => {
                return Err(VolError::InvalidRequest(format!(
                    "cannot clone '{}' onto itself",
                    volume
                )));
            }
            ActionRequest::Export { path } | ActionRequest::Import { path } if path.trim().is_empty() => {
                Some("path")
            }
            ActionRequest::Save { image } | ActionRequest::Load { image } if image.trim().is_empty() => {
                Some("image")
            }
            ActionRequest::Push { reference } | ActionRequest::Pull { reference }
                if reference.trim().is_empty() =>
            {
                Some("reference")
            }
            ActionRequest::Transfer { dest_host, .. } if dest_host.trim().is_empty() => Some("destination host"),
            _ => None,
        };
        match missing {
            Some(what) => Err(VolError::InvalidRequest(format!(
                "{} requires a {}",
                self.kind(),
                what
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_and_clone_refresh_directory() {
        assert_eq!(ActionRequest::Delete.follow_up(), FollowUp::RefreshDirectory);
        let clone = ActionRequest::Clone {
            dest_volume: "copy".into(),
        };
        assert_eq!(clone.follow_up(), FollowUp::RefreshDirectory);
    }

    #[test]
    fn content_writers_recompute_size() {
        assert_eq!(ActionRequest::Empty.follow_up(), FollowUp::RecomputeSize);
        let import = ActionRequest::Import {
            path: "/tmp/a.tar.gz".into(),
        };
        assert_eq!(import.follow_up(), FollowUp::RecomputeSize);
    }

    #[test]
    fn export_has_no_follow_up() {
        let export = ActionRequest::Export { path: "/tmp".into() };
        assert_eq!(export.follow_up(), FollowUp::None);
        assert_eq!(export.method(), Method::GET);
        assert_eq!(export.query(), vec![("path", "/tmp")]);
    }

    #[test]
    fn transfer_carries_both_destinations() {
        let transfer = ActionRequest::Transfer {
            dest_host: "ssh://backup".into(),
            dest_volume: "pg-data".into(),
        };
        assert_eq!(transfer.method(), Method::POST);
        assert_eq!(
            transfer.query(),
            vec![("destHost", "ssh://backup"), ("destVolume", "pg-data")]
        );
    }

    #[test]
    fn push_sends_reference_in_body() {
        let push = ActionRequest::Push {
            reference: "registry.local/vol:1".into(),
        };
        assert_eq!(
            push.body(),
            Some(serde_json::json!({ "reference": "registry.local/vol:1" }))
        );
        assert!(ActionRequest::Delete.body().is_none());
    }

    #[test]
    fn validate_rejects_missing_arguments() {
        assert!(ActionRequest::Delete.validate("").is_err());
        assert!(ActionRequest::Delete.validate("data").is_ok());
        let clone = ActionRequest::Clone {
            dest_volume: " ".into(),
        };
        assert!(clone.validate("data").is_err());
        let export = ActionRequest::Export { path: String::new() };
        assert!(export.validate("data").is_err());
    }

    #[test]
    fn validate_rejects_clone_onto_itself() {
        let clone = ActionRequest::Clone {
            dest_volume: "data".into(),
        };
        let err = clone.validate("data").unwrap_err();
        assert!(format!("{}", err).contains("onto itself"));
    }
}
