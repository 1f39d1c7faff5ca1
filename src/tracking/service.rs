use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::models::{
    Failure, FailureGroup, FailureTaxonomy, Inspection, InspectionDto, NewInspection,
    NewProductionOrder, ProductionOrder,
};
use super::repository::{FailureRepository, InspectionRepository, ProductionOrderRepository};
use crate::errors::{TrackerError, TrackerResult};

/// Business operations on production orders. Handlers depend on this trait,
/// not on the repository.
#[async_trait]
pub trait ProductionOrderService: Send + Sync {
    async fn new_order(&self, order: NewProductionOrder) -> TrackerResult<()>;
    async fn get_order_by_id(&self, id: &str) -> TrackerResult<ProductionOrder>;
    async fn get_open_orders(&self) -> TrackerResult<Vec<ProductionOrder>>;
    async fn close_order(&self, id: &str) -> TrackerResult<ProductionOrder>;
}

pub struct OrderServiceImpl {
    repository: Arc<dyn ProductionOrderRepository>,
}

impl OrderServiceImpl {
    pub fn new(repository: Arc<dyn ProductionOrderRepository>) -> Self {
        Self { repository }
    }
}

fn require_id<'a>(field: &str, id: &'a str) -> TrackerResult<&'a str> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        warn!(field, "rejecting empty identifier");
        return Err(TrackerError::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

#[async_trait]
impl ProductionOrderService for OrderServiceImpl {
    async fn new_order(&self, mut order: NewProductionOrder) -> TrackerResult<()> {
        order.id = require_id("id", &order.id)?.to_string();
        if order.order_size <= 0 {
            warn!(order_id = %order.id, order_size = order.order_size, "rejecting non-positive order size");
            return Err(TrackerError::validation(format!(
                "order_size must be positive, got {}",
                order.order_size
            )));
        }
        let id = order.id.clone();
        self.repository.save(order).await?;
        info!(order_id = %id, "production order registered");
        Ok(())
    }

    async fn get_order_by_id(&self, id: &str) -> TrackerResult<ProductionOrder> {
        self.repository.get(require_id("orderid", id)?).await
    }

    async fn get_open_orders(&self) -> TrackerResult<Vec<ProductionOrder>> {
        self.repository.get_open().await
    }

    async fn close_order(&self, id: &str) -> TrackerResult<ProductionOrder> {
        let order = self.repository.close(require_id("orderid", id)?).await?;
        info!(order_id = %order.id, status = order.status().as_str(), "production order closed");
        Ok(order)
    }
}

// ── Inspections ───────────────────────────────────────────────────────

#[async_trait]
pub trait InspectionService: Send + Sync {
    async fn submit(&self, dto: InspectionDto) -> TrackerResult<Vec<Inspection>>;
    async fn list_for_order(&self, order_id: &str) -> TrackerResult<Vec<Inspection>>;
}

pub struct InspectionServiceImpl {
    repository: Arc<dyn InspectionRepository>,
}

impl InspectionServiceImpl {
    pub fn new(repository: Arc<dyn InspectionRepository>) -> Self {
        Self { repository }
    }
}

/// Expand a wire submission into the records to store: one passed record, one
/// failed record without a code, or one failed record per distinct code.
pub fn inspections_from_dto(dto: InspectionDto) -> TrackerResult<Vec<NewInspection>> {
    let production_order_id =
        require_id("production_order_id", dto.production_order_id.as_deref().unwrap_or(""))?
            .to_string();
    let raw_part = require_id("part_id", dto.part_id.as_deref().unwrap_or(""))?;
    let part_id: i32 = raw_part
        .parse()
        .map_err(|_| TrackerError::validation(format!("part_id '{}' is not a number", raw_part)))?;

    let mut codes: Vec<String> = Vec::new();
    for code in dto.errors.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }
    if !dto.failed && !codes.is_empty() {
        return Err(TrackerError::validation(
            "a passing inspection cannot carry failure codes",
        ));
    }

    let template = NewInspection {
        production_order_id,
        part_id,
        inspector_id: i64::from(dto.inspector_id.unwrap_or_default()),
        inspector_name: dto.inspector_name.unwrap_or_default(),
        failure_code: None,
        passed: !dto.failed,
        comment: dto.comments.unwrap_or_default(),
        date_time: dto.timestamp.unwrap_or_else(Utc::now),
    };

    if codes.is_empty() {
        return Ok(vec![template]);
    }
    Ok(codes
        .into_iter()
        .map(|code| NewInspection {
            failure_code: Some(code),
            ..template.clone()
        })
        .collect())
}

#[async_trait]
impl InspectionService for InspectionServiceImpl {
    async fn submit(&self, dto: InspectionDto) -> TrackerResult<Vec<Inspection>> {
        let batch = inspections_from_dto(dto)?;
        let recorded = self.repository.record(batch).await?;
        if let Some(first) = recorded.first() {
            info!(
                order_id = %first.production_order_id,
                part_id = first.part_id,
                passed = first.passed,
                records = recorded.len(),
                "inspection recorded"
            );
        }
        Ok(recorded)
    }

    async fn list_for_order(&self, order_id: &str) -> TrackerResult<Vec<Inspection>> {
        self.repository
            .list_for_order(require_id("orderid", order_id)?)
            .await
    }
}

// ── Failure catalog ───────────────────────────────────────────────────

/// Read side of the failure taxonomy plus seeding.
pub struct FailureCatalog {
    repository: Arc<dyn FailureRepository>,
}

impl FailureCatalog {
    pub fn new(repository: Arc<dyn FailureRepository>) -> Self {
        Self { repository }
    }

    pub async fn groups(&self) -> TrackerResult<Vec<FailureGroup>> {
        self.repository.list_groups().await
    }

    pub async fn failures(&self, group: Option<&str>) -> TrackerResult<Vec<Failure>> {
        let group = group.map(str::trim).filter(|g| !g.is_empty());
        self.repository.list_failures(group).await
    }

    /// Every failure must name a group present either in the same seed or
    /// already in the store.
    pub async fn seed(&self, taxonomy: FailureTaxonomy) -> TrackerResult<usize> {
        for group in &taxonomy.groups {
            require_id("group code", &group.code)?;
        }
        let known = self.repository.list_groups().await?;
        for failure in &taxonomy.failures {
            require_id("failure code", &failure.code)?;
            let group_known = taxonomy
                .groups
                .iter()
                .chain(known.iter())
                .any(|g| g.code == failure.failure_group_code);
            if !group_known {
                return Err(TrackerError::validation(format!(
                    "failure {} references unknown group {}",
                    failure.code, failure.failure_group_code
                )));
            }
        }
        let written = self.repository.seed(taxonomy).await?;
        info!(rows = written, "failure taxonomy seeded");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory repository that records which calls reached it.
    #[derive(Default)]
    struct FakeOrderRepository {
        saved: Mutex<Vec<NewProductionOrder>>,
        calls: Mutex<Vec<&'static str>>,
        fail_storage: bool,
    }

    #[async_trait]
    impl ProductionOrderRepository for FakeOrderRepository {
        async fn save(&self, order: NewProductionOrder) -> TrackerResult<()> {
            self.calls.lock().unwrap().push("save");
            if self.fail_storage {
                return Err(TrackerError::Storage(anyhow::anyhow!("disk full")));
            }
            self.saved.lock().unwrap().push(order);
            Ok(())
        }

        async fn get(&self, id: &str) -> TrackerResult<ProductionOrder> {
            self.calls.lock().unwrap().push("get");
            Err(TrackerError::OrderNotFound { id: id.to_string() })
        }

        async fn close(&self, id: &str) -> TrackerResult<ProductionOrder> {
            self.calls.lock().unwrap().push("close");
            if self.fail_storage {
                return Err(TrackerError::Storage(anyhow::anyhow!("disk full")));
            }
            Err(TrackerError::OrderNotFound { id: id.to_string() })
        }

        async fn get_open(&self) -> TrackerResult<Vec<ProductionOrder>> {
            self.calls.lock().unwrap().push("get_open");
            Ok(Vec::new())
        }
    }

    fn service(repo: Arc<FakeOrderRepository>) -> OrderServiceImpl {
        OrderServiceImpl::new(repo)
    }

    fn order(id: &str, size: i32) -> NewProductionOrder {
        NewProductionOrder {
            id: id.to_string(),
            model_internal_code: "M1".to_string(),
            order_size: size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_order_delegates_given_order() {
        let repo = Arc::new(FakeOrderRepository::default());
        service(repo.clone()).new_order(order("PO-1", 10)).await.unwrap();

        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "PO-1");
        assert_eq!(saved[0].order_size, 10);
    }

    #[tokio::test]
    async fn test_new_order_rejects_non_positive_size() {
        let repo = Arc::new(FakeOrderRepository::default());
        for size in [0, -5] {
            let err = service(repo.clone()).new_order(order("PO-1", size)).await.unwrap_err();
            assert!(matches!(err, TrackerError::Validation(_)));
        }
        assert!(repo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_order_rejects_blank_id() {
        let repo = Arc::new(FakeOrderRepository::default());
        let err = service(repo.clone()).new_order(order("   ", 3)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert!(repo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_order_trims_id() {
        let repo = Arc::new(FakeOrderRepository::default());
        service(repo.clone()).new_order(order(" PO-7 ", 1)).await.unwrap();
        assert_eq!(repo.saved.lock().unwrap()[0].id, "PO-7");
    }

    #[tokio::test]
    async fn test_close_surfaces_storage_failure() {
        let repo = Arc::new(FakeOrderRepository {
            fail_storage: true,
            ..Default::default()
        });
        let err = service(repo).close_order("PO-1").await.unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn test_empty_lookup_id_never_reaches_repository() {
        let repo = Arc::new(FakeOrderRepository::default());
        let svc = service(repo.clone());
        assert!(svc.get_order_by_id("").await.is_err());
        assert!(svc.close_order(" ").await.is_err());
        assert!(repo.calls.lock().unwrap().is_empty());
    }

    fn dto() -> InspectionDto {
        InspectionDto {
            production_order_id: Some("PO-1".into()),
            part_id: Some("17".into()),
            inspector_id: Some(4),
            inspector_name: Some("K. Osei".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_passing_dto_yields_single_record() {
        let records = inspections_from_dto(dto()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].passed);
        assert_eq!(records[0].part_id, 17);
        assert_eq!(records[0].inspector_id, 4);
        assert!(records[0].failure_code.is_none());
    }

    #[test]
    fn test_failed_dto_fans_out_distinct_codes() {
        let records = inspections_from_dto(InspectionDto {
            failed: true,
            errors: vec!["DIM-01".into(), "SRF-02".into(), "DIM-01".into(), " ".into()],
            comments: Some("burr on edge".into()),
            ..dto()
        })
        .unwrap();
        let codes: Vec<_> = records.iter().map(|r| r.failure_code.as_deref().unwrap()).collect();
        assert_eq!(codes, vec!["DIM-01", "SRF-02"]);
        assert!(records.iter().all(|r| !r.passed && r.comment == "burr on edge"));
        assert_eq!(records[0].date_time, records[1].date_time);
    }

    #[test]
    fn test_failed_dto_without_codes_yields_one_failed_record() {
        let records = inspections_from_dto(InspectionDto { failed: true, ..dto() }).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].passed);
    }

    #[test]
    fn test_dto_validation() {
        let missing_order = InspectionDto {
            production_order_id: None,
            ..dto()
        };
        assert!(inspections_from_dto(missing_order).is_err());

        let bad_part = InspectionDto {
            part_id: Some("P-17".into()),
            ..dto()
        };
        assert!(inspections_from_dto(bad_part).is_err());

        let passing_with_codes = InspectionDto {
            errors: vec!["DIM-01".into()],
            ..dto()
        };
        assert!(inspections_from_dto(passing_with_codes).is_err());
    }
}
