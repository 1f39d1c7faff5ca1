//! Data access for production orders, inspections and the failure catalog.
//!
//! Each trait has exactly one implementation here, backed by [`DbHandle`].
//! Repositories do not validate; they translate calls into statements and
//! store outcomes into [`TrackerError`] variants.

use async_trait::async_trait;
use tracing::debug;

use super::db::DbHandle;
use super::models::{
    CloseOutcome, Failure, FailureGroup, FailureTaxonomy, Inspection, NewInspection,
    NewProductionOrder, ProductionOrder,
};
use crate::errors::{TrackerError, TrackerResult};

#[async_trait]
pub trait ProductionOrderRepository: Send + Sync {
    async fn save(&self, order: NewProductionOrder) -> TrackerResult<()>;
    async fn get(&self, id: &str) -> TrackerResult<ProductionOrder>;
    async fn close(&self, id: &str) -> TrackerResult<ProductionOrder>;
    async fn get_open(&self) -> TrackerResult<Vec<ProductionOrder>>;
}

#[async_trait]
pub trait InspectionRepository: Send + Sync {
    async fn record(&self, batch: Vec<NewInspection>) -> TrackerResult<Vec<Inspection>>;
    async fn list_for_order(&self, order_id: &str) -> TrackerResult<Vec<Inspection>>;
}

#[async_trait]
pub trait FailureRepository: Send + Sync {
    async fn list_groups(&self) -> TrackerResult<Vec<FailureGroup>>;
    async fn list_failures(&self, group: Option<&str>) -> TrackerResult<Vec<Failure>>;
    async fn seed(&self, taxonomy: FailureTaxonomy) -> TrackerResult<usize>;
}

// ── SQLite implementations ────────────────────────────────────────────

pub struct SqliteOrderRepository {
    db: DbHandle,
}

impl SqliteOrderRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductionOrderRepository for SqliteOrderRepository {
    async fn save(&self, order: NewProductionOrder) -> TrackerResult<()> {
        debug!(order_id = %order.id, "saving production order");
        self.db
            .call(move |db| db.insert_order(&order))
            .await
            .map_err(TrackerError::Storage)
    }

    async fn get(&self, id: &str) -> TrackerResult<ProductionOrder> {
        debug!(order_id = %id, "fetching production order");
        let owned = id.to_string();
        self.db
            .call(move |db| db.get_order(&owned))
            .await
            .map_err(TrackerError::Storage)?
            .ok_or_else(|| TrackerError::OrderNotFound { id: id.to_string() })
    }

    async fn close(&self, id: &str) -> TrackerResult<ProductionOrder> {
        debug!(order_id = %id, "closing production order");
        let owned = id.to_string();
        let outcome = self
            .db
            .call(move |db| db.close_order(&owned))
            .await
            .map_err(TrackerError::Storage)?;
        match outcome {
            CloseOutcome::Closed(order) => Ok(order),
            CloseOutcome::AlreadyClosed => Err(TrackerError::OrderAlreadyClosed { id: id.to_string() }),
            CloseOutcome::Missing => Err(TrackerError::OrderNotFound { id: id.to_string() }),
        }
    }

    async fn get_open(&self) -> TrackerResult<Vec<ProductionOrder>> {
        self.db
            .call(|db| db.list_open_orders())
            .await
            .map_err(TrackerError::Storage)
    }
}

pub struct SqliteInspectionRepository {
    db: DbHandle,
}

impl SqliteInspectionRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InspectionRepository for SqliteInspectionRepository {
    async fn record(&self, batch: Vec<NewInspection>) -> TrackerResult<Vec<Inspection>> {
        debug!(count = batch.len(), "recording inspections");
        self.db
            .call(move |db| db.insert_inspections(&batch))
            .await
            .map_err(TrackerError::Storage)
    }

    async fn list_for_order(&self, order_id: &str) -> TrackerResult<Vec<Inspection>> {
        let owned = order_id.to_string();
        self.db
            .call(move |db| db.list_inspections(&owned))
            .await
            .map_err(TrackerError::Storage)
    }
}

pub struct SqliteFailureRepository {
    db: DbHandle,
}

impl SqliteFailureRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FailureRepository for SqliteFailureRepository {
    async fn list_groups(&self) -> TrackerResult<Vec<FailureGroup>> {
        self.db
            .call(|db| db.list_failure_groups())
            .await
            .map_err(TrackerError::Storage)
    }

    async fn list_failures(&self, group: Option<&str>) -> TrackerResult<Vec<Failure>> {
        let group = group.map(str::to_string);
        self.db
            .call(move |db| db.list_failures(group.as_deref()))
            .await
            .map_err(TrackerError::Storage)
    }

    async fn seed(&self, taxonomy: FailureTaxonomy) -> TrackerResult<usize> {
        debug!(
            groups = taxonomy.groups.len(),
            failures = taxonomy.failures.len(),
            "seeding failure taxonomy"
        );
        self.db
            .call(move |db| db.upsert_taxonomy(&taxonomy))
            .await
            .map_err(TrackerError::Storage)
    }
}
