//! Per-request collection: resolve -> connect -> traverse -> disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::TargetStore;
use crate::connection::with_connection;
use crate::error::{CollectError, Result};
use crate::inventory::Connector;
use crate::traversal::{traverse, Collection};

pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);

/// Entry point of the pipeline. Shared by all requests; holds nothing that a
/// request writes to.
pub struct Collector<C> {
    store: Arc<TargetStore>,
    connector: C,
    timeout: Duration,
}

impl<C: Connector> Collector<C> {
    pub fn new(store: Arc<TargetStore>, connector: C) -> Self {
        Self {
            store,
            connector,
            timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    /// Collects the inventory of `target` (`default` when `None`).
    ///
    /// Returns `Err` for failures that leave nothing to report: unknown
    /// target, login failure, organization listing failure, timeout. Anything
    /// else ends up in `Collection::errors` next to the samples that could be
    /// produced.
    pub async fn collect(&self, target: Option<&str>) -> Result<Collection> {
        let config = self.store.resolve(target)?;
        let started = Instant::now();

        let outcome = with_connection(&self.connector, config, self.timeout, |session| async move {
            let mut collection = Collection::default();
            traverse(session.as_ref(), &mut collection).await?;
            Ok::<_, CollectError>(collection)
        })
        .await;

        match &outcome {
            Ok(collection) => info!(
                section = %config.section,
                samples = collection.samples.len(),
                errors = collection.errors.len(),
                elapsed = ?started.elapsed(),
                "collection finished"
            ),
            Err(err) => warn!(
                section = %config.section,
                error = %err,
                elapsed = ?started.elapsed(),
                "collection failed"
            ),
        }
        outcome
    }
}
