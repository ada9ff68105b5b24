//! Repository capability consumed by the shortening, resolution and analytics
//! components, plus its redb-backed implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};

use crate::database::{
    analytics_index_bounds, analytics_index_key, TABLE_ANALYTICS, TABLE_ANALYTICS_INDEX,
    TABLE_CLICK_COUNTS, TABLE_LINKS,
};
use crate::error::RepositoryError;
use crate::model::{AnalyticsEvent, ClickEvent, Link};

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Storage operations for links and their access events
///
/// Dropping a returned future before it resolves cancels the operation: a
/// write that has not committed yet is rolled back.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Inserts a link if its short code is unused.
    ///
    /// Returns `Err(RepositoryError::Conflict)` if the code already exists;
    /// nothing is written in that case.
    async fn save_link(&self, link: &Link) -> Result<()>;

    /// Looks up a link. `Ok(None)` means absent; `Err` means the store failed.
    async fn get_link(&self, short_code: &str) -> Result<Option<Link>>;

    async fn link_exists(&self, short_code: &str) -> Result<bool>;

    /// Appends an access event and returns its assigned id.
    async fn save_analytics(&self, click: &ClickEvent) -> Result<u64>;

    /// Most recent `limit` events, newest first; equal timestamps are ordered
    /// by id descending.
    async fn get_analytics(&self, short_code: &str, limit: usize) -> Result<Vec<AnalyticsEvent>>;

    async fn count_analytics(&self, short_code: &str) -> Result<u64>;
}

/// Raised when the future awaiting a blocking storage call is dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn abort_if_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(RepositoryError::Cancelled);
    }
    Ok(())
}

/// [`Repository`] backed by the embedded redb database
///
/// redb transactions block, so every operation runs on the blocking pool.
/// Write transactions check the cancellation flag after acquiring the writer
/// lock and again right before commit.
#[derive(Clone)]
pub struct RedbRepository {
    db: Arc<Database>,
}

impl RedbRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &AtomicBool) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        tokio::task::spawn_blocking(move || op(&db, &cancelled)).await?
    }
}

#[async_trait]
impl Repository for RedbRepository {
    async fn save_link(&self, link: &Link) -> Result<()> {
        let short_code = link.short_code.clone();
        let record_json = serde_json::to_string(link)?;

        self.run_blocking(move |db, cancelled| {
            let write_txn = db.begin_write()?;
            abort_if_cancelled(cancelled)?;
            {
                let mut links = write_txn.open_table(TABLE_LINKS)?;

                // Only one write transaction is live at a time, so this check and
                // the insert below cannot interleave with another writer
                if links.get(short_code.as_str())?.is_some() {
                    return Err(RepositoryError::Conflict(short_code));
                }

                links.insert(short_code.as_str(), record_json.as_str())?;
            }
            abort_if_cancelled(cancelled)?;
            write_txn.commit()?;

            Ok(())
        })
        .await
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<Link>> {
        let short_code = short_code.to_string();

        self.run_blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let links = read_txn.open_table(TABLE_LINKS)?;

            let link = match links.get(short_code.as_str())? {
                Some(value) => Some(serde_json::from_str::<Link>(value.value())?),
                None => None,
            };
            Ok(link)
        })
        .await
    }

    async fn link_exists(&self, short_code: &str) -> Result<bool> {
        let short_code = short_code.to_string();

        self.run_blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let links = read_txn.open_table(TABLE_LINKS)?;
            let exists = links.get(short_code.as_str())?.is_some();
            Ok(exists)
        })
        .await
    }

    async fn save_analytics(&self, click: &ClickEvent) -> Result<u64> {
        let click = click.clone();

        self.run_blocking(move |db, cancelled| {
            let write_txn = db.begin_write()?;
            abort_if_cancelled(cancelled)?;
            let id = {
                let mut events = write_txn.open_table(TABLE_ANALYTICS)?;
                let id = events.last()?.map(|(key, _)| key.value() + 1).unwrap_or(1);

                let event = AnalyticsEvent::from_click(id, &click);
                let event_json = serde_json::to_string(&event)?;
                events.insert(id, event_json.as_str())?;

                let index_key =
                    analytics_index_key(&click.short_code, click.timestamp.timestamp_micros(), id);
                let mut index = write_txn.open_table(TABLE_ANALYTICS_INDEX)?;
                index.insert(index_key.as_str(), id)?;

                let mut counts = write_txn.open_table(TABLE_CLICK_COUNTS)?;
                let current = counts
                    .get(click.short_code.as_str())?
                    .map(|guard| guard.value())
                    .unwrap_or(0);
                counts.insert(click.short_code.as_str(), current + 1)?;

                id
            };
            abort_if_cancelled(cancelled)?;
            write_txn.commit()?;

            Ok(id)
        })
        .await
    }

    async fn get_analytics(&self, short_code: &str, limit: usize) -> Result<Vec<AnalyticsEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let short_code = short_code.to_string();

        self.run_blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let index = read_txn.open_table(TABLE_ANALYTICS_INDEX)?;
            let events = read_txn.open_table(TABLE_ANALYTICS)?;

            let (start_key, end_key) = analytics_index_bounds(&short_code);

            let mut recent = Vec::with_capacity(limit.min(64));
            for entry in index
                .range(start_key.as_str()..end_key.as_str())?
                .rev()
                .take(limit)
            {
                let (_, id) = entry?;
                let id = id.value();

                match events.get(id)? {
                    Some(value) => {
                        recent.push(serde_json::from_str::<AnalyticsEvent>(value.value())?)
                    }
                    None => tracing::warn!(
                        id,
                        short_code = %short_code,
                        "analytics index points at missing event"
                    ),
                }
            }

            Ok(recent)
        })
        .await
    }

    async fn count_analytics(&self, short_code: &str) -> Result<u64> {
        let short_code = short_code.to_string();

        self.run_blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let counts = read_txn.open_table(TABLE_CLICK_COUNTS)?;
            let count = counts
                .get(short_code.as_str())?
                .map(|guard| guard.value())
                .unwrap_or(0);
            Ok(count)
        })
        .await
    }
}
