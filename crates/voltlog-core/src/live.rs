//! Live-updating queries
//!
//! A [`LiveQuery`] holds the latest full result of a query and refreshes it
//! in a background task whenever a relevant [`ChangeEvent`] is published.
//! Bursts of writes may be folded into one refresh; the last refresh always
//! runs after the last write it saw.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use voltlog_store::{Store, StoreResult};
use voltlog_util::SubscriptionId;

use crate::service::run_blocking;
use crate::{BatteryService, ChangeEvent, LedgerResult};

/// Subscription to the current result of a query.
///
/// Dropping the handle (or calling [`LiveQuery::cancel`]) stops the refresh
/// task; nothing else needs cleaning up.
pub struct LiveQuery<T> {
    receiver: watch::Receiver<Vec<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) async fn spawn<Q, R>(service: &BatteryService, query: Q, relevant: R) -> LedgerResult<Self>
    where
        Q: Fn(&dyn Store) -> StoreResult<Vec<T>> + Send + Sync + 'static,
        R: Fn(&ChangeEvent) -> bool + Send + 'static,
    {
        let store = service.store();
        let query = Arc::new(query);

        // Subscribe before the first read so no write can slip in between
        let mut changes = service.subscribe_changes();
        let initial = {
            let query = Arc::clone(&query);
            run_blocking(Arc::clone(&store), move |store| query(store)).await?
        };

        let (sender, receiver) = watch::channel(initial);
        let id = SubscriptionId::new();
        let task_id = id.clone();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) if !relevant(&event) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(subscription = %task_id, skipped, "Live query lagged, refreshing");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                // Whatever else is already queued is covered by this refresh
                while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) = changes.try_recv() {}

                let query = Arc::clone(&query);
                match run_blocking(Arc::clone(&store), move |store| query(store)).await {
                    Ok(snapshot) => {
                        if sender.send(snapshot).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(subscription = %task_id, error = %e, "Live query refresh failed"),
                }
            }
            debug!(subscription = %task_id, "Live query stopped");
        });

        debug!(subscription = %id, "Live query started");
        Ok(Self { receiver, task })
    }

    /// The most recent snapshot
    pub fn current(&self) -> Vec<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the query can no longer produce updates.
    pub async fn changed(&mut self) -> Option<Vec<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Stop receiving updates
    pub fn cancel(self) {
        drop(self);
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
