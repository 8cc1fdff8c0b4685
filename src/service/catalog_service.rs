//! Incident catalog retrieval.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::dispatch::{Dispatcher, JobHandler, PoolOptions, QueueMode};
use crate::domain::{IncidentType, default_catalog};
use crate::error::ServiceError;
use crate::observability::{CATALOG_QUEUE_DEPTH, SharedMetrics};

struct CatalogCopy {
    catalog: Arc<[IncidentType]>,
}

#[async_trait]
impl JobHandler for CatalogCopy {
    type Input = ();
    type Output = Vec<IncidentType>;

    async fn handle(&self, _ctx: &CallContext, _input: ()) -> Vec<IncidentType> {
        self.catalog.to_vec()
    }
}

/// Serves the incident-type catalog through a small worker pool.
#[derive(Debug)]
pub struct CatalogService {
    pool: Dispatcher<CatalogCopy>,
}

impl CatalogService {
    /// Starts `workers` catalog workers over the built-in catalog.
    #[must_use]
    pub fn new(workers: usize, metrics: SharedMetrics) -> Self {
        Self::with_catalog(workers, default_catalog(), metrics)
    }

    /// Starts `workers` catalog workers over `catalog`.
    #[must_use]
    pub fn with_catalog(workers: usize, catalog: Vec<IncidentType>, metrics: SharedMetrics) -> Self {
        let pool = Dispatcher::new(
            PoolOptions {
                name: "catalog",
                depth_gauge: CATALOG_QUEUE_DEPTH,
                workers,
                queue: QueueMode::Handoff,
            },
            CatalogCopy {
                catalog: catalog.into(),
            },
            metrics,
        );
        Self { pool }
    }

    /// Returns an owned copy of the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Dispatch`] if `ctx` ends first or the pool
    /// is closed.
    pub async fn fetch(&self, ctx: &CallContext) -> Result<Vec<IncidentType>, ServiceError> {
        Ok(self.pool.submit(ctx, ()).await?)
    }

    /// Closes the pool and waits for its workers.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
