use std::fmt;

use serde_json::Value;

/// A `label=key[=value]` condition on an event's actor attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    pub key: String,
    pub value: Option<String>,
}

impl LabelFilter {
    /// Parse `key=value`, or a bare `key` meaning "label present".
    pub fn parse(pair: &str) -> Self {
        match pair.split_once('=') {
            Some((key, value)) => Self {
                key: key.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Self {
                key: pair.trim().to_string(),
                value: None,
            },
        }
    }

    fn matches(&self, attributes: Option<&Value>) -> bool {
        let found = attributes
            .and_then(|attrs| attrs.get(&self.key))
            .and_then(Value::as_str);
        match (&self.value, found) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

/// Which daemon events a subscription wants.
///
/// The filter is passed to the engine as `--filter` arguments and checked
/// again on every received line, so a source that ignores filters still
/// delivers only matching events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Stream name used in logs and errors.
    pub name: String,
    /// Event `Type`, e.g. `volume` or `container`.
    pub event_type: String,
    pub labels: Vec<LabelFilter>,
}

impl EventFilter {
    /// All volume lifecycle events.
    pub fn volumes() -> Self {
        Self {
            name: "volume-events".to_string(),
            event_type: "volume".to_string(),
            labels: Vec::new(),
        }
    }

    /// Container events from this extension's workers that ask for a
    /// refresh. Both labels must be present with the given values.
    pub fn extension_workers(project_label: &str, refresh_label: &str) -> Self {
        Self {
            name: "action-events".to_string(),
            event_type: "container".to_string(),
            labels: vec![
                LabelFilter::parse(project_label),
                LabelFilter::parse(refresh_label),
            ],
        }
    }

    /// `--filter` arguments for the engine's `events` command.
    pub fn engine_args(&self) -> Vec<String> {
        let mut args = vec!["--filter".to_string(), format!("type={}", self.event_type)];
        for label in &self.labels {
            args.push("--filter".to_string());
            args.push(format!("label={}", label));
        }
        args
    }

    /// Whether a raw event line passes this filter.
    ///
    /// Lines that are not JSON objects never match.
    pub fn matches(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            return false;
        };

        let event_type = event
            .get("Type")
            .or_else(|| event.get("type"))
            .and_then(Value::as_str);
        if event_type != Some(self.event_type.as_str()) {
            return false;
        }

        let attributes = event.get("Actor").and_then(|actor| actor.get("Attributes"));
        self.labels.iter().all(|label| label.matches(attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "com.docker.compose.project=volumes-extension";
    const REFRESH: &str = "com.volumes-extension.trigger-ui-refresh=true";

    fn container_event(labels: &[(&str, &str)]) -> String {
        let attrs: serde_json::Map<String, Value> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        serde_json::json!({
            "Type": "container",
            "Action": "die",
            "Actor": { "ID": "abc123", "Attributes": attrs }
        })
        .to_string()
    }

    #[test]
    fn label_parse_forms() {
        assert_eq!(
            LabelFilter::parse("a.b=c"),
            LabelFilter {
                key: "a.b".into(),
                value: Some("c".into())
            }
        );
        assert_eq!(LabelFilter::parse("flag").value, None);
        assert_eq!(LabelFilter::parse("k=v=w").value.as_deref(), Some("v=w"));
    }

    #[test]
    fn engine_args_for_worker_filter() {
        let filter = EventFilter::extension_workers(PROJECT, REFRESH);
        assert_eq!(
            filter.engine_args(),
            vec![
                "--filter".to_string(),
                "type=container".to_string(),
                "--filter".to_string(),
                format!("label={}", PROJECT),
                "--filter".to_string(),
                format!("label={}", REFRESH),
            ]
        );
    }

    #[test]
    fn volume_filter_matches_volume_events_only() {
        let filter = EventFilter::volumes();
        assert!(filter.matches(r#"{"Type":"volume","Action":"create","Actor":{"ID":"data"}}"#));
        assert!(filter.matches(r#"{"type":"volume","status":"destroy"}"#));
        assert!(!filter.matches(r#"{"Type":"network","Action":"create"}"#));
    }

    #[test]
    fn worker_filter_requires_both_labels() {
        let filter = EventFilter::extension_workers(PROJECT, REFRESH);
        let both = container_event(&[
            ("com.docker.compose.project", "volumes-extension"),
            ("com.volumes-extension.trigger-ui-refresh", "true"),
        ]);
        let project_only = container_event(&[("com.docker.compose.project", "volumes-extension")]);
        let wrong_value = container_event(&[
            ("com.docker.compose.project", "someone-else"),
            ("com.volumes-extension.trigger-ui-refresh", "true"),
        ]);
        assert!(filter.matches(&both));
        assert!(!filter.matches(&project_only));
        assert!(!filter.matches(&wrong_value));
    }

    #[test]
    fn garbage_lines_never_match() {
        let filter = EventFilter::volumes();
        assert!(!filter.matches(""));
        assert!(!filter.matches("   "));
        assert!(!filter.matches("Error response from daemon"));
        assert!(!filter.matches("[1,2,3]"));
    }
}
