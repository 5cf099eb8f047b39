//! Progress reporting for long-running operations.
//!
//! Workers emit events through a cloneable [`ProgressReporter`]. A
//! [`DoneGuard`] held by the task driving the work sends the `DONE`
//! sentinel when dropped, so a consumer always sees the terminator: on
//! success, on error, and on panic (the guard is dropped while the task
//! unwinds). The channel closes once the guard and every reporter are gone.
//!
//! Sends never fail from the worker's point of view. If the consumer went
//! away (client disconnected), events are discarded and the work goes on.

use std::future::Future;

use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;

use ivy_core::progress::{ProgressEvent, ProgressKind};

/// One-directional emitter of [`ProgressEvent`]s.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// Sends `DONE` when dropped.
#[derive(Debug)]
pub struct DoneGuard {
    reporter: ProgressReporter,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Guard that terminates this reporter's stream when dropped.
    #[must_use]
    pub fn done_guard(&self) -> DoneGuard {
        DoneGuard {
            reporter: self.clone(),
        }
    }

    pub fn emit(&self, kind: ProgressKind, message: impl Into<String>) {
        let event = ProgressEvent::new(kind, message);
        match kind {
            ProgressKind::Error => tracing::error!(message = %event.message, "progress"),
            ProgressKind::Warning => tracing::warn!(message = %event.message, "progress"),
            _ => tracing::debug!(message = %event.message, kind = ?kind, "progress"),
        }
        // Consumer gone: keep working.
        let _ = self.tx.send(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(ProgressKind::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(ProgressKind::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(ProgressKind::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ProgressKind::Error, message);
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.emit(ProgressKind::Progress, message);
    }
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.reporter.tx.send(ProgressEvent::done());
    }
}

/// Run `work` on its own task and return the stream of its progress events.
///
/// An `Err` returned by `work` becomes an `error` event. The stream ends
/// with the `DONE` event.
pub fn spawn_with_progress<F, Fut, E>(work: F) -> impl Stream<Item = ProgressEvent> + Send + 'static
where
    F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display,
{
    let (reporter, rx) = ProgressReporter::channel();

    tokio::spawn(async move {
        let _done = reporter.done_guard();
        if let Err(e) = work(reporter.clone()).await {
            reporter.error(e.to_string());
        }
    });

    into_stream(rx)
}

/// Adapt the receiving end of a reporter channel into a stream that ends
/// after `DONE`.
pub fn into_stream(
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
) -> impl Stream<Item = ProgressEvent> + Send + 'static {
    stream! {
        while let Some(event) = rx.recv().await {
            let done = event.is_done();
            yield event;
            if done {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_guard_sends_done_last_and_channel_closes() {
        let (reporter, mut rx) = ProgressReporter::channel();
        let guard = reporter.done_guard();
        reporter.info("starting");
        reporter.warning("careful");
        drop(guard);
        drop(reporter);

        let first = rx.recv().await;
        assert_eq!(first.map(|e| e.kind), Some(ProgressKind::Info));
        let second = rx.recv().await;
        assert_eq!(second.map(|e| e.kind), Some(ProgressKind::Warning));
        let last = rx.recv().await;
        assert!(last.is_some_and(|e| e.is_done()));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_error_result_becomes_error_event_before_done() {
        let events: Vec<ProgressEvent> = spawn_with_progress(|progress| async move {
            progress.info("working");
            Err::<(), _>("shop not found")
        })
        .collect()
        .await;

        let kinds: Vec<ProgressKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ProgressKind::Info, ProgressKind::Error, ProgressKind::Success]
        );
        assert_eq!(events[1].message, "shop not found");
        assert!(events[2].is_done());
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn test_panic_still_terminates_stream() {
        let events: Vec<ProgressEvent> = spawn_with_progress(|progress| async move {
            progress.info("about to fail");
            panic!("boom");
            Ok::<(), String>(())
        })
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(events.last().is_some_and(ProgressEvent::is_done));
    }

    #[tokio::test]
    async fn test_disconnected_consumer_does_not_stop_work() {
        let events = spawn_with_progress(|progress| async move {
            progress.info("nobody listens");
            Ok::<(), String>(())
        });
        drop(events);

        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.info("still fine");
        drop(reporter.done_guard());
    }
}
