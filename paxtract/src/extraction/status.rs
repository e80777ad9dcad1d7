//! Status protocol emitted by an extraction queue.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// One status update, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Tasks still waiting on the stack.
    Left(usize),
    /// Variant chosen for the active episode.
    Option { audio: String, quality: u32 },
    /// Fraction of the current phase, in `[0, 1]`.
    Progress(f64),
    /// Episode whose segments are being fetched; `None` once the queue drained.
    Current(Option<u32>),
    Start,
    End,
    Error(String),
    Warning(String),
}

pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// Sends [`StatusEvent`]s for one series. A dropped receiver is not an error.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    series: String,
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusReporter {
    /// Create a reporter together with the receiving end.
    pub fn channel(series: impl Into<String>) -> (Self, StatusReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                series: series.into(),
                tx: Some(tx),
            },
            rx,
        )
    }

    /// A reporter that only logs.
    pub fn detached(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            tx: None,
        }
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn emit(&self, event: StatusEvent) {
        match &event {
            StatusEvent::Error(msg) => error!(series = %self.series, "{msg}"),
            StatusEvent::Warning(msg) => warn!(series = %self.series, "{msg}"),
            StatusEvent::Progress(value) => trace!(series = %self.series, progress = value),
            other => debug!(series = %self.series, event = ?other, "Status"),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, value: f64) {
        self.emit(StatusEvent::Progress(value.clamp(0.0, 1.0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_tagged_pairs() {
        let json = serde_json::to_string(&StatusEvent::Left(3)).unwrap();
        assert_eq!(json, r#"{"type":"left","value":3}"#);

        let json = serde_json::to_string(&StatusEvent::Option {
            audio: "jpn".into(),
            quality: 720,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"option","value":{"audio":"jpn","quality":720}}"#);

        let json = serde_json::to_string(&StatusEvent::Current(None)).unwrap();
        assert_eq!(json, r#"{"type":"current","value":null}"#);
    }

    #[test]
    fn progress_is_clamped() {
        let (reporter, mut rx) = StatusReporter::channel("show");
        reporter.progress(1.7);
        reporter.progress(-0.2);
        assert_eq!(rx.try_recv().unwrap(), StatusEvent::Progress(1.0));
        assert_eq!(rx.try_recv().unwrap(), StatusEvent::Progress(0.0));
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (reporter, rx) = StatusReporter::channel("show");
        drop(rx);
        reporter.emit(StatusEvent::Start);
    }
}
