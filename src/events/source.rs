use std::io;
use std::process::Stdio;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::error::VolError;

use super::EventFilter;

/// Longest event line accepted; longer lines are skipped.
const MAX_EVENT_LINE: usize = 64 * 1024;

/// Raw event lines in arrival order. Ends when the underlying stream does;
/// an `Err` item is always the last one.
pub type EventStream = BoxStream<'static, Result<String, VolError>>;

/// Something that can open a daemon event stream for a filter.
pub trait EventSource: Send + Sync {
    fn open(&self, filter: &EventFilter) -> Result<EventStream, VolError>;
}

/// Event source backed by the container engine CLI
/// (`<engine> events --format {{json .}} --filter ...`).
///
/// The child process is killed when the stream is dropped. Its stderr is
/// forwarded to the log. Must be opened from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct EngineEventSource {
    program: String,
}

impl EngineEventSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl EventSource for EngineEventSource {
    fn open(&self, filter: &EventFilter) -> Result<EventStream, VolError> {
        let mut child = Command::new(&self.program)
            .arg("events")
            .arg("--format")
            .arg("{{json .}}")
            .args(filter.engine_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stream_name = filter.name.clone();
        tracing::debug!(stream = %stream_name, program = %self.program, "Started event stream");

        if let Some(stderr) = child.stderr.take() {
            let stream_name = stream_name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(stream = %stream_name, "{}", line);
                }
            });
        }

        let stdout = child.stdout.take().ok_or_else(|| VolError::StreamClosed {
            stream: stream_name.clone(),
            reason: "engine stdout was not captured".to_string(),
        })?;
        let lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_EVENT_LINE));

        let state = EngineStream {
            name: stream_name,
            lines,
            child,
            skipped: false,
        };
        Ok(stream::unfold(Some(state), next_line).boxed())
    }
}

struct EngineStream {
    name: String,
    lines: FramedRead<ChildStdout, LinesCodec>,
    child: Child,
    /// A bad line was just skipped; the reader reports one `None` after
    /// every decode error before it resumes.
    skipped: bool,
}

async fn next_line(
    state: Option<EngineStream>,
) -> Option<(Result<String, VolError>, Option<EngineStream>)> {
    let mut state = state?;
    loop {
        match state.lines.next().await {
            Some(Ok(line)) => {
                state.skipped = false;
                return Some((Ok(line), Some(state)));
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!(stream = %state.name, "Skipping oversized event line");
                state.skipped = true;
            }
            Some(Err(LinesCodecError::Io(e))) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!(stream = %state.name, "Skipping event line that is not UTF-8");
                state.skipped = true;
            }
            None if state.skipped => state.skipped = false,
            Some(Err(LinesCodecError::Io(e))) => {
                let err = VolError::StreamClosed {
                    stream: state.name,
                    reason: e.to_string(),
                };
                return Some((Err(err), None));
            }
            None => {
                return match state.child.wait().await {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some((
                        Err(VolError::StreamClosed {
                            stream: state.name,
                            reason: format!("engine exited with {}", status),
                        }),
                        None,
                    )),
                    Err(e) => Some((
                        Err(VolError::StreamClosed {
                            stream: state.name,
                            reason: e.to_string(),
                        }),
                        None,
                    )),
                };
            }
        }
    }
}
