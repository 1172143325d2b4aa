//! Fan-out/fan-in: one tokio task per parameter group, records merged into a
//! single sequence in completion order.
//!
//! Every worker pushes into one unbounded channel and sends exactly one
//! `Done` message, whatever way it ends (completed, failed, panicked or
//! cancelled). The consumer drains until it has seen one `Done` per worker.

use futures::{FutureExt, Stream, StreamExt};
use serde::Deserialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// What happens to the run when one worker fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerFailurePolicy {
    /// Log the failure, record it in the summary, keep draining the others.
    #[default]
    Isolate,
    /// Yield the first failure as an error and cancel the remaining workers.
    Propagate,
}

#[derive(Debug)]
enum WorkerOutcome {
    Completed,
    Failed(String),
    Panicked(String),
    Cancelled,
}

enum WorkerMessage<R> {
    Record(R),
    Done { label: String, outcome: WorkerOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub label: String,
    pub error: String,
    pub panicked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub workers: usize,
    pub completed: usize,
    pub failed: Vec<WorkerFailure>,
    pub cancelled: usize,
}

impl FanOutSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "panic (unknown payload)".to_string()
}

/// Handle on a running fan-out. Dropping it cancels every worker.
pub struct FanOut<R> {
    rx: mpsc::UnboundedReceiver<WorkerMessage<R>>,
    handles: Vec<JoinHandle<()>>,
    remaining: usize,
    policy: WorkerFailurePolicy,
    cancel: CancellationToken,
    aborted: bool,
    summary: FanOutSummary,
    _guard: DropGuard,
}

/// Spawns one worker per `(label, params)` group. `produce` builds the
/// worker's record stream; an `Err` item ends that worker as failed.
pub fn fan_out<P, S, R, F>(
    groups: Vec<(String, P)>,
    policy: WorkerFailurePolicy,
    cancel: &CancellationToken,
    produce: F,
) -> FanOut<R>
where
    F: Fn(P) -> S,
    S: Stream<Item = eyre::Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = cancel.child_token();
    let workers = groups.len();

    let handles = groups
        .into_iter()
        .map(|(label, params)| {
            let stream = produce(params);
            let tx = tx.clone();
            let token = cancel.clone();

            tokio::spawn(async move {
                tracing::debug!(worker = %label, "Worker started");
                let work = async {
                    let mut stream = std::pin::pin!(stream);
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(record) => {
                                if tx.send(WorkerMessage::Record(record)).is_err() {
                                    return WorkerOutcome::Cancelled;
                                }
                            }
                            Err(e) => return WorkerOutcome::Failed(format!("{e:#}")),
                        }
                    }
                    WorkerOutcome::Completed
                };

                let outcome = tokio::select! {
                    _ = token.cancelled() => WorkerOutcome::Cancelled,
                    result = AssertUnwindSafe(work).catch_unwind() => {
                        result.unwrap_or_else(|payload| WorkerOutcome::Panicked(panic_message(payload)))
                    }
                };
                let _ = tx.send(WorkerMessage::Done { label, outcome });
            })
        })
        .collect();

    FanOut {
        rx,
        handles,
        remaining: workers,
        policy,
        _guard: cancel.clone().drop_guard(),
        cancel,
        aborted: false,
        summary: FanOutSummary {
            workers,
            ..Default::default()
        },
    }
}

impl<R> FanOut<R> {
    /// Next record from any worker. Returns `None` once every worker has
    /// finished, or right after a propagated failure.
    pub async fn next(&mut self) -> Option<eyre::Result<R>> {
        while self.remaining > 0 && !self.aborted {
            let message = self.rx.recv().await?;
            match message {
                WorkerMessage::Record(record) => return Some(Ok(record)),
                WorkerMessage::Done { label, outcome } => {
                    if let Some(err) = self.record_done(label, outcome) {
                        return Some(Err(err));
                    }
                }
            }
        }
        None
    }

    fn record_done(&mut self, label: String, outcome: WorkerOutcome) -> Option<eyre::Report> {
        self.remaining = self.remaining.saturating_sub(1);
        let (error, panicked) = match outcome {
            WorkerOutcome::Completed => {
                tracing::debug!(worker = %label, "Worker completed");
                self.summary.completed += 1;
                return None;
            }
            WorkerOutcome::Cancelled => {
                tracing::debug!(worker = %label, "Worker cancelled");
                self.summary.cancelled += 1;
                return None;
            }
            WorkerOutcome::Failed(error) => (error, false),
            WorkerOutcome::Panicked(error) => (error, true),
        };

        tracing::warn!(worker = %label, error = %error, panicked, "Worker failed");
        self.summary.failed.push(WorkerFailure {
            label: label.clone(),
            error: error.clone(),
            panicked,
        });

        if self.policy == WorkerFailurePolicy::Propagate && !self.aborted {
            self.aborted = true;
            self.cancel.cancel();
            return Some(eyre::eyre!("worker '{}' failed: {}", label, error));
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn summary(&self) -> &FanOutSummary {
        &self.summary
    }

    /// Cancels whatever is still running, joins every worker and returns the
    /// run summary. Records still queued are discarded.
    pub async fn finish(mut self) -> FanOutSummary {
        if self.remaining > 0 {
            self.cancel.cancel();
        }
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task did not join cleanly");
            }
        }
        while let Ok(message) = self.rx.try_recv() {
            if let WorkerMessage::Done { label, outcome } = message {
                self.record_done(label, outcome);
            }
        }
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, BoxStream};
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Emit(u32),
        FailAfter(u32),
        Panic,
        Hang,
    }

    fn produce(behaviour: Behaviour) -> BoxStream<'static, eyre::Result<u32>> {
        match behaviour {
            Behaviour::Emit(n) => stream::iter((0..n).map(Ok)).boxed(),
            Behaviour::FailAfter(n) => stream::iter((0..n).map(Ok))
                .chain(stream::once(async { Err(eyre::eyre!("archive unreachable")) }))
                .boxed(),
            Behaviour::Panic => stream::once(async {
                if true {
                    panic!("decoder exploded");
                }
                Ok(0)
            })
            .boxed(),
            Behaviour::Hang => stream::iter([Ok(1)]).chain(stream::pending()).boxed(),
        }
    }

    fn groups(behaviours: &[(&str, Behaviour)]) -> Vec<(String, Behaviour)> {
        behaviours.iter().map(|(l, b)| (l.to_string(), *b)).collect()
    }

    async fn drain(fan: &mut FanOut<u32>) -> (Vec<u32>, Vec<String>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        while let Some(item) = fan.next().await {
            match item {
                Ok(r) => records.push(r),
                Err(e) => errors.push(e.to_string()),
            }
        }
        (records, errors)
    }

    #[tokio::test]
    async fn test_merges_all_workers() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(
            groups(&[("bsc", Behaviour::Emit(3)), ("base", Behaviour::Emit(5)), ("zksync", Behaviour::Emit(0))]),
            WorkerFailurePolicy::Isolate,
            &cancel,
            produce,
        );
        let (records, errors) = drain(&mut fan).await;
        assert_eq!(records.len(), 8);
        assert!(errors.is_empty());

        let summary = fan.finish().await;
        assert_eq!(summary.workers, 3);
        assert_eq!(summary.completed, 3);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn test_isolate_keeps_other_workers() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(
            groups(&[("bsc", Behaviour::FailAfter(2)), ("base", Behaviour::Emit(4))]),
            WorkerFailurePolicy::Isolate,
            &cancel,
            produce,
        );
        let (records, errors) = drain(&mut fan).await;
        assert_eq!(records.len(), 6);
        assert!(errors.is_empty());

        let summary = fan.finish().await;
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].label, "bsc");
        assert!(summary.failed[0].error.contains("archive unreachable"));
        assert!(!summary.failed[0].panicked);
    }

    #[tokio::test]
    async fn test_panic_counts_as_failure() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(
            groups(&[("celo", Behaviour::Panic), ("kava", Behaviour::Emit(2))]),
            WorkerFailurePolicy::Isolate,
            &cancel,
            produce,
        );
        let (records, _) = drain(&mut fan).await;
        assert_eq!(records.len(), 2);

        let summary = fan.finish().await;
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].panicked);
        assert_eq!(summary.failed[0].error, "decoder exploded");
    }

    #[tokio::test]
    async fn test_propagate_cancels_the_rest() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(
            groups(&[("stuck", Behaviour::Hang), ("broken", Behaviour::FailAfter(0))]),
            WorkerFailurePolicy::Propagate,
            &cancel,
            produce,
        );
        let (_, errors) = tokio::time::timeout(Duration::from_secs(5), drain(&mut fan))
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("broken"));

        let summary = tokio::time::timeout(Duration::from_secs(5), fan.finish())
            .await
            .unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.cancelled, 1);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(
            groups(&[("a", Behaviour::Hang), ("b", Behaviour::Hang)]),
            WorkerFailurePolicy::Isolate,
            &cancel,
            produce,
        );
        assert_eq!(fan.next().await.unwrap().unwrap(), 1);
        cancel.cancel();

        let (_, errors) = tokio::time::timeout(Duration::from_secs(5), drain(&mut fan))
            .await
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(fan.summary().cancelled, 2);
        fan.finish().await;
    }

    #[tokio::test]
    async fn test_no_groups() {
        let cancel = CancellationToken::new();
        let mut fan = fan_out(Vec::new(), WorkerFailurePolicy::Isolate, &cancel, produce);
        assert!(fan.next().await.is_none());
        assert_eq!(fan.finish().await, FanOutSummary::default());
    }

    #[test]
    fn test_policy_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            failure_policy: WorkerFailurePolicy,
        }
        let w: Wrapper = toml::from_str(r#"failure_policy = "propagate""#).unwrap();
        assert_eq!(w.failure_policy, WorkerFailurePolicy::Propagate);
        assert_eq!(WorkerFailurePolicy::default(), WorkerFailurePolicy::Isolate);
    }
}
