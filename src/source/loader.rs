use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error};

use super::{Resolution, SourceKind, SurveyLocation, resolve};
use crate::fetch::HttpClient;
use crate::model::Dataset;

/// The dataset a session should display right now.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Arc<Dataset>,
    pub source: SourceKind,
    /// The survey attempt is still in flight and may replace `dataset`.
    pub loading: bool,
}

impl Snapshot {
    /// Fallback data, available before the survey attempt finishes.
    pub fn pending() -> Self {
        let fallback = Resolution::fallback();
        Self {
            dataset: fallback.dataset,
            source: fallback.source,
            loading: true,
        }
    }

    pub fn settled(resolution: Resolution) -> Self {
        Self {
            dataset: resolution.dataset,
            source: resolution.source,
            loading: false,
        }
    }
}

/// Runs the one survey attempt of a session in the background.
///
/// The fallback snapshot is published immediately; the resolved snapshot
/// replaces it in a single send. [`SurveyLoader::cancel`] (or drop) aborts an
/// in-flight attempt, and a result that is already computed is not published.
pub struct SurveyLoader {
    state: watch::Receiver<Snapshot>,
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SurveyLoader {
    /// Spawns the attempt on the current tokio runtime.
    pub fn start<C>(client: C, location: SurveyLocation) -> Self
    where
        C: HttpClient + 'static,
    {
        let (tx, rx) = watch::channel(Snapshot::pending());
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let span = tracing::info_span!("survey_loader", location = %location);

        let task = tokio::spawn(
            async move {
                let resolution = resolve(&client, &location).await;
                let published = tx.send_if_modified(|snapshot| {
                    if flag.load(Ordering::Acquire) {
                        return false;
                    }
                    *snapshot = Snapshot::settled(resolution);
                    true
                });
                if !published {
                    debug!("Session disposed, discarding survey result");
                }
            }
            .instrument(span),
        );

        Self {
            state: rx,
            cancelled,
            task: Some(task),
        }
    }

    /// Current snapshot; never blocks.
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// A receiver that observes every snapshot this loader publishes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// Waits until the attempt has settled. If the loader was cancelled first,
    /// returns the last published snapshot.
    pub async fn settled(&mut self) -> Snapshot {
        let settled = self
            .state
            .wait_for(|s| !s.loading)
            .await
            .map(|s| Snapshot::clone(&s));
        settled.unwrap_or_else(|_| self.state.borrow().clone())
    }

    /// Marks the session as disposed and aborts the attempt; a pending result
    /// will not be applied.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Waits for the background task to exit.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            match task.await {
                Err(e) if e.is_cancelled() => debug!("Survey loader task aborted"),
                Err(e) => error!(error = %e, "Survey loader task failed"),
                Ok(()) => {}
            }
        }
    }
}

impl Drop for SurveyLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}
