//! Analytics recording
//!
//! Redirects hand click events to a bounded queue and return immediately. A
//! single writer task owned by the process drains the queue and persists each
//! event under its own timeout, outside of any request's cancellation scope.
//! When the queue is full the event is dropped with a warning; analytics are
//! best-effort and must not slow down redirects.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AnalyticsSettings;
use crate::error::{AnalyticsError, ServiceError};
use crate::model::{AnalyticsEvent, ClickEvent};
use crate::repository::Repository;

/// Handle used by request handlers to record clicks and query aggregates
///
/// Cloning is cheap; every clone feeds the same writer task. The writer exits
/// once all handles have been dropped and the queue is empty.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    sender: mpsc::Sender<ClickEvent>,
    repo: Arc<dyn Repository>,
}

impl AnalyticsRecorder {
    /// Creates the queue and spawns the writer task on the current runtime
    pub fn spawn(repo: Arc<dyn Repository>, settings: &AnalyticsSettings) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let writer = tokio::spawn(run_writer(
            Arc::clone(&repo),
            receiver,
            settings.write_timeout,
        ));

        (Self { sender, repo }, writer)
    }

    /// Queues one click for persistence without waiting for the write
    pub fn record(&self, click: ClickEvent) -> Result<(), AnalyticsError> {
        self.sender.try_send(click).map_err(|err| match err {
            TrySendError::Full(_) => AnalyticsError::QueueFull,
            TrySendError::Closed(_) => AnalyticsError::QueueClosed,
        })
    }

    /// Total number of recorded clicks for `short_code`
    pub async fn count(&self, short_code: &str) -> Result<u64, ServiceError> {
        Ok(self.repo.count_analytics(short_code).await?)
    }

    /// The `limit` most recent clicks for `short_code`, newest first
    pub async fn recent(
        &self,
        short_code: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsEvent>, ServiceError> {
        Ok(self.repo.get_analytics(short_code, limit).await?)
    }
}

/// Writes one event, bounded by `write_timeout`
pub async fn persist(
    repo: &dyn Repository,
    click: &ClickEvent,
    write_timeout: Duration,
) -> Result<u64, AnalyticsError> {
    match tokio::time::timeout(write_timeout, repo.save_analytics(click)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AnalyticsError::Timeout(write_timeout)),
    }
}

async fn run_writer(
    repo: Arc<dyn Repository>,
    mut receiver: mpsc::Receiver<ClickEvent>,
    write_timeout: Duration,
) {
    debug!("analytics writer started");

    while let Some(click) = receiver.recv().await {
        match persist(repo.as_ref(), &click, write_timeout).await {
            Ok(id) => debug!(id, short_code = %click.short_code, "click recorded"),
            Err(err) => warn!(
                error = %err,
                short_code = %click.short_code,
                "failed to save analytics"
            ),
        }
    }

    debug!("analytics queue closed, writer exiting");
}
