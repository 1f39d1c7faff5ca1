use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;

/// RFC 3339 UTC timestamp with millisecond precision, generated by SQLite.
const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Async-safe handle to the tracking database.
///
/// Wraps `TrackingDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`. Every call is bounded by the
/// statement timeout.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TrackingDb>>,
    timeout: Duration,
}

impl DbHandle {
    pub fn new(db: TrackingDb) -> Self {
        let timeout = db.statement_timeout;
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
            timeout,
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackingDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            // The caller may already have given up; an abandoned call must not
            // touch the store.
            if Instant::now() >= deadline {
                return Err(deadline_exceeded(timeout));
            }
            f(&guard)
        });
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined.context("DB task panicked")?,
            Err(_) => Err(deadline_exceeded(timeout)),
        }
    }
}

fn deadline_exceeded(timeout: Duration) -> anyhow::Error {
    anyhow::anyhow!("Database call exceeded {} ms deadline", timeout.as_millis())
}

/// Where the store lives, parsed from a `DATABASE_URL`-style string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(std::path::PathBuf),
}

impl DatabaseTarget {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            anyhow::bail!("Database URL is empty");
        }
        let rest = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        match rest {
            ":memory:" | "" => Ok(Self::Memory),
            path => Ok(Self::File(std::path::PathBuf::from(path))),
        }
    }
}

pub struct TrackingDb {
    conn: Connection,
    statement_timeout: Duration,
}

impl TrackingDb {
    /// Open (or create) a SQLite database at the given path and bootstrap the schema.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self {
            conn,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        };
        db.init()?;
        Ok(db)
    }

    pub fn open(target: &DatabaseTarget) -> Result<Self> {
        match target {
            DatabaseTarget::Memory => Self::new_in_memory(),
            DatabaseTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
                Self::new(path)
            }
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.as_millis() > i32::MAX as u128 {
            anyhow::bail!("Statement timeout of {} ms is too large", timeout.as_millis());
        }
        self.conn
            .busy_timeout(timeout)
            .context("Failed to set busy timeout")?;
        self.statement_timeout = timeout;
        Ok(self)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .busy_timeout(self.statement_timeout)
            .context("Failed to set busy timeout")?;
        self.create_schema().context("Failed to create schema")?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS production_orders (
                    id TEXT PRIMARY KEY NOT NULL,
                    model_internal_code TEXT NOT NULL DEFAULT '',
                    model_internal_name TEXT NOT NULL DEFAULT '',
                    model_trade_name TEXT NOT NULL DEFAULT '',
                    order_size INTEGER NOT NULL,
                    start_timestamp TEXT NOT NULL,
                    end_timestamp TEXT
                );

                CREATE TABLE IF NOT EXISTS inspections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    production_order_id TEXT NOT NULL,
                    part_id INTEGER NOT NULL,
                    inspector_id INTEGER NOT NULL DEFAULT 0,
                    inspector_name TEXT NOT NULL DEFAULT '',
                    failure_code TEXT,
                    passed INTEGER NOT NULL,
                    comment TEXT NOT NULL DEFAULT '',
                    date_time TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS failure_groups (
                    code TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    comment TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE IF NOT EXISTS failures (
                    code TEXT PRIMARY KEY NOT NULL,
                    failure_group_code TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT ''
                );

                CREATE INDEX IF NOT EXISTS idx_orders_open ON production_orders(end_timestamp, start_timestamp);
                CREATE INDEX IF NOT EXISTS idx_inspections_order ON inspections(production_order_id);
                CREATE INDEX IF NOT EXISTS idx_failures_group ON failures(failure_group_code);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Production orders ─────────────────────────────────────────────

    pub fn insert_order(&self, order: &NewProductionOrder) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO production_orders (id, model_internal_code, model_internal_name, model_trade_name, order_size, start_timestamp, end_timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, {}, NULL)",
                    NOW_SQL
                ),
                params![
                    order.id,
                    order.model_internal_code,
                    order.model_internal_name,
                    order.model_trade_name,
                    order.order_size,
                ],
            )
            .with_context(|| format!("Production order {} not saved", order.id))?;
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Result<Option<ProductionOrder>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, model_internal_code, model_internal_name, model_trade_name, order_size, start_timestamp, end_timestamp
                 FROM production_orders WHERE id = ?1",
                params![id],
                OrderRow::from_row,
            )
            .optional()
            .context("Failed to query production order")?;
        row.map(OrderRow::into_order).transpose()
    }

    /// Stamp `end_timestamp` on an open order. The update only matches open
    /// rows; a zero row count is then resolved into missing vs already closed.
    pub fn close_order(&self, id: &str) -> Result<CloseOutcome> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE production_orders SET end_timestamp = {} WHERE id = ?1 AND end_timestamp IS NULL",
                    NOW_SQL
                ),
                params![id],
            )
            .context("Failed to close production order")?;

        match self.get_order(id)? {
            Some(order) if changed > 0 => Ok(CloseOutcome::Closed(order)),
            Some(_) => Ok(CloseOutcome::AlreadyClosed),
            None => Ok(CloseOutcome::Missing),
        }
    }

    pub fn list_open_orders(&self) -> Result<Vec<ProductionOrder>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, model_internal_code, model_internal_name, model_trade_name, order_size, start_timestamp, end_timestamp
                 FROM production_orders WHERE end_timestamp IS NULL
                 ORDER BY start_timestamp ASC, id ASC",
            )
            .context("Failed to prepare list_open_orders")?;
        let rows = stmt
            .query_map([], OrderRow::from_row)
            .context("Failed to query open production orders")?;
        let mut orders = Vec::new();
        for row in rows {
            let r = row.context("Failed to read production order row")?;
            orders.push(r.into_order()?);
        }
        Ok(orders)
    }

    // ── Inspections ───────────────────────────────────────────────────

    /// Insert a batch of inspections atomically, returning them with their
    /// store-assigned ids.
    pub fn insert_inspections(&self, batch: &[NewInspection]) -> Result<Vec<Inspection>> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let mut ids = Vec::with_capacity(batch.len());
        for inspection in batch {
            tx.execute(
                "INSERT INTO inspections (production_order_id, part_id, inspector_id, inspector_name, failure_code, passed, comment, date_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    inspection.production_order_id,
                    inspection.part_id,
                    inspection.inspector_id,
                    inspection.inspector_name,
                    inspection.failure_code,
                    inspection.passed,
                    inspection.comment,
                    format_timestamp(&inspection.date_time),
                ],
            )
            .context("Failed to insert inspection")?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit().context("Failed to commit inspections")?;

        // Returned records carry the stored millisecond precision
        let mut recorded = Vec::with_capacity(batch.len());
        for (id, i) in ids.into_iter().zip(batch.iter().cloned()) {
            recorded.push(Inspection {
                id,
                production_order_id: i.production_order_id,
                part_id: i.part_id,
                inspector_id: i.inspector_id,
                inspector_name: i.inspector_name,
                failure_code: i.failure_code,
                passed: i.passed,
                comment: i.comment,
                date_time: parse_timestamp(&format_timestamp(&i.date_time))?,
            });
        }
        Ok(recorded)
    }

    pub fn list_inspections(&self, production_order_id: &str) -> Result<Vec<Inspection>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, production_order_id, part_id, inspector_id, inspector_name, failure_code, passed, comment, date_time
                 FROM inspections WHERE production_order_id = ?1
                 ORDER BY date_time ASC, id ASC",
            )
            .context("Failed to prepare list_inspections")?;
        let rows = stmt
            .query_map(params![production_order_id], |row| {
                Ok(InspectionRow {
                    id: row.get(0)?,
                    production_order_id: row.get(1)?,
                    part_id: row.get(2)?,
                    inspector_id: row.get(3)?,
                    inspector_name: row.get(4)?,
                    failure_code: row.get(5)?,
                    passed: row.get(6)?,
                    comment: row.get(7)?,
                    date_time: row.get(8)?,
                })
            })
            .context("Failed to query inspections")?;
        let mut inspections = Vec::new();
        for row in rows {
            let r = row.context("Failed to read inspection row")?;
            inspections.push(r.into_inspection()?);
        }
        Ok(inspections)
    }

    // ── Failure taxonomy ──────────────────────────────────────────────

    pub fn list_failure_groups(&self) -> Result<Vec<FailureGroup>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, name, comment FROM failure_groups ORDER BY code")
            .context("Failed to prepare list_failure_groups")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FailureGroup {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    comment: row.get(2)?,
                })
            })
            .context("Failed to query failure groups")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read failure group row")
    }

    pub fn list_failures(&self, group: Option<&str>) -> Result<Vec<Failure>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT code, failure_group_code, name, description FROM failures
                 WHERE ?1 IS NULL OR failure_group_code = ?1
                 ORDER BY failure_group_code, code",
            )
            .context("Failed to prepare list_failures")?;
        let rows = stmt
            .query_map(params![group], |row| {
                Ok(Failure {
                    code: row.get(0)?,
                    failure_group_code: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                })
            })
            .context("Failed to query failures")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read failure row")
    }

    /// Upsert the whole taxonomy in one transaction. Returns the number of
    /// group and failure rows written.
    pub fn upsert_taxonomy(&self, taxonomy: &FailureTaxonomy) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let mut written = 0;
        for group in &taxonomy.groups {
            written += tx
                .execute(
                    "INSERT INTO failure_groups (code, name, comment) VALUES (?1, ?2, ?3)
                     ON CONFLICT(code) DO UPDATE SET name = excluded.name, comment = excluded.comment",
                    params![group.code, group.name, group.comment],
                )
                .with_context(|| format!("Failed to upsert failure group {}", group.code))?;
        }
        for failure in &taxonomy.failures {
            written += tx
                .execute(
                    "INSERT INTO failures (code, failure_group_code, name, description) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(code) DO UPDATE SET failure_group_code = excluded.failure_group_code,
                         name = excluded.name, description = excluded.description",
                    params![
                        failure.code,
                        failure.failure_group_code,
                        failure.name,
                        failure.description
                    ],
                )
                .with_context(|| format!("Failed to upsert failure {}", failure.code))?;
        }
        tx.commit().context("Failed to commit failure taxonomy")?;
        Ok(written)
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse timestamp '{}'", raw))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Intermediate row struct for production orders; timestamps stay as text
/// until converted.
struct OrderRow {
    id: String,
    model_internal_code: String,
    model_internal_name: String,
    model_trade_name: String,
    order_size: i32,
    start_timestamp: String,
    end_timestamp: Option<String>,
}

impl OrderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            model_internal_code: row.get(1)?,
            model_internal_name: row.get(2)?,
            model_trade_name: row.get(3)?,
            order_size: row.get(4)?,
            start_timestamp: row.get(5)?,
            end_timestamp: row.get(6)?,
        })
    }

    fn into_order(self) -> Result<ProductionOrder> {
        let start = parse_timestamp(&self.start_timestamp).context("Bad start_timestamp")?;
        let end = self
            .end_timestamp
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .context("Bad end_timestamp")?;
        Ok(ProductionOrder {
            id: self.id,
            model_internal_code: self.model_internal_code,
            model_internal_name: self.model_internal_name,
            model_trade_name: self.model_trade_name,
            order_size: self.order_size,
            start,
            end,
        })
    }
}

struct InspectionRow {
    id: i64,
    production_order_id: String,
    part_id: i32,
    inspector_id: i64,
    inspector_name: String,
    failure_code: Option<String>,
    passed: bool,
    comment: String,
    date_time: String,
}

impl InspectionRow {
    fn into_inspection(self) -> Result<Inspection> {
        Ok(Inspection {
            id: self.id,
            production_order_id: self.production_order_id,
            part_id: self.part_id,
            inspector_id: self.inspector_id,
            inspector_name: self.inspector_name,
            failure_code: self.failure_code,
            passed: self.passed,
            comment: self.comment,
            date_time: parse_timestamp(&self.date_time)?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(id: &str, size: i32) -> NewProductionOrder {
        NewProductionOrder {
            id: id.to_string(),
            model_internal_code: "M1".to_string(),
            model_internal_name: "Pump housing".to_string(),
            model_trade_name: "AquaMax".to_string(),
            order_size: size,
        }
    }

    fn inspection(order_id: &str, code: Option<&str>) -> NewInspection {
        NewInspection {
            production_order_id: order_id.to_string(),
            part_id: 7,
            inspector_id: 42,
            inspector_name: "R. Diaz".to_string(),
            failure_code: code.map(str::to_string),
            passed: code.is_none(),
            comment: String::new(),
            date_time: Utc::now(),
        }
    }

    #[test]
    fn test_create_database_and_schema() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('production_orders', 'inspections', 'failure_groups', 'failures')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 4, "Expected 4 tables to exist");

        // Bootstrapping twice is a no-op
        db.create_schema()?;
        Ok(())
    }

    #[test]
    fn test_insert_and_get_order() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        db.insert_order(&new_order("PO-1", 10))?;

        let order = db.get_order("PO-1")?.expect("order should exist");
        assert_eq!(order.id, "PO-1");
        assert_eq!(order.model_internal_code, "M1");
        assert_eq!(order.model_trade_name, "AquaMax");
        assert_eq!(order.order_size, 10);
        assert!(order.end.is_none());
        assert!(order.start <= Utc::now());
        Ok(())
    }

    #[test]
    fn test_get_missing_order_returns_none() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        assert!(db.get_order("nope")?.is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_order_id_is_rejected() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        db.insert_order(&new_order("PO-1", 10))?;
        let err = db.insert_order(&new_order("PO-1", 5)).unwrap_err();
        assert!(format!("{:#}", err).contains("UNIQUE"));
        // Original row untouched
        assert_eq!(db.get_order("PO-1")?.unwrap().order_size, 10);
        Ok(())
    }

    #[test]
    fn test_close_order_outcomes() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        db.insert_order(&new_order("PO-1", 10))?;

        match db.close_order("PO-1")? {
            CloseOutcome::Closed(order) => assert!(order.end.is_some()),
            other => panic!("Expected Closed, got {:?}", other),
        }
        let first_end = db.get_order("PO-1")?.unwrap().end;

        assert_eq!(db.close_order("PO-1")?, CloseOutcome::AlreadyClosed);
        assert_eq!(db.get_order("PO-1")?.unwrap().end, first_end);

        assert_eq!(db.close_order("PO-404")?, CloseOutcome::Missing);
        Ok(())
    }

    #[test]
    fn test_list_open_orders_excludes_closed() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        db.insert_order(&new_order("A", 1))?;
        db.insert_order(&new_order("B", 2))?;
        db.close_order("B")?;

        let open = db.list_open_orders()?;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "A");
        Ok(())
    }

    #[test]
    fn test_list_open_orders_ordered_by_start() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        db.insert_order(&new_order("late", 1))?;
        db.insert_order(&new_order("early", 1))?;
        db.conn.execute(
            "UPDATE production_orders SET start_timestamp = '2024-01-01T08:00:00.000Z' WHERE id = 'early'",
            [],
        )?;

        let ids: Vec<String> = db.list_open_orders()?.into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
        Ok(())
    }

    #[test]
    fn test_insert_and_list_inspections() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        let saved = db.insert_inspections(&[
            inspection("PO-1", None),
            inspection("PO-1", Some("DIM-01")),
            inspection("PO-2", None),
        ])?;
        assert_eq!(saved.len(), 3);
        assert!(saved[0].id < saved[1].id);

        let listed = db.list_inspections("PO-1")?;
        assert_eq!(listed.len(), 2);
        assert!(listed[0].passed);
        assert_eq!(listed[1].failure_code.as_deref(), Some("DIM-01"));
        assert!(!listed[1].passed);
        assert_eq!(listed[0].inspector_name, "R. Diaz");
        assert_eq!(listed[0], saved[0]);
        Ok(())
    }

    #[test]
    fn test_upsert_taxonomy_and_filter_failures() -> Result<()> {
        let db = TrackingDb::new_in_memory()?;
        let mut taxonomy = FailureTaxonomy {
            groups: vec![
                FailureGroup {
                    code: "DIM".into(),
                    name: "Dimensional".into(),
                    comment: String::new(),
                },
                FailureGroup {
                    code: "SRF".into(),
                    name: "Surface".into(),
                    comment: String::new(),
                },
            ],
            failures: vec![
                Failure {
                    code: "DIM-01".into(),
                    failure_group_code: "DIM".into(),
                    name: "Oversize".into(),
                    description: String::new(),
                },
                Failure {
                    code: "SRF-01".into(),
                    failure_group_code: "SRF".into(),
                    name: "Scratch".into(),
                    description: String::new(),
                },
            ],
        };
        assert_eq!(db.upsert_taxonomy(&taxonomy)?, 4);

        taxonomy.groups[0].name = "Dimensions".into();
        db.upsert_taxonomy(&taxonomy)?;

        let groups = db.list_failure_groups()?;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Dimensions");

        assert_eq!(db.list_failures(None)?.len(), 2);
        let surface = db.list_failures(Some("SRF"))?;
        assert_eq!(surface.len(), 1);
        assert_eq!(surface[0].code, "SRF-01");
        Ok(())
    }

    #[test]
    fn test_database_target_parse() -> Result<()> {
        assert_eq!(DatabaseTarget::parse("sqlite::memory:")?, DatabaseTarget::Memory);
        assert_eq!(DatabaseTarget::parse(":memory:")?, DatabaseTarget::Memory);
        assert_eq!(
            DatabaseTarget::parse("sqlite://data/mfg.db")?,
            DatabaseTarget::File("data/mfg.db".into())
        );
        assert_eq!(
            DatabaseTarget::parse("/var/lib/mfg.db")?,
            DatabaseTarget::File("/var/lib/mfg.db".into())
        );
        assert!(DatabaseTarget::parse("  ").is_err());
        Ok(())
    }

    #[test]
    fn test_open_file_database_creates_parent_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/mfg.db");
        let db = TrackingDb::open(&DatabaseTarget::File(path.clone()))?;
        db.insert_order(&new_order("PO-1", 1))?;
        drop(db);

        let reopened = TrackingDb::new(&path)?;
        assert!(reopened.get_order("PO-1")?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_runs_closure() -> Result<()> {
        let handle = DbHandle::new(TrackingDb::new_in_memory()?);
        handle
            .call(|db| db.insert_order(&new_order("PO-1", 3)))
            .await?;
        let order = handle.call(|db| db.get_order("PO-1")).await?;
        assert_eq!(order.unwrap().order_size, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_enforces_deadline() -> Result<()> {
        let db = TrackingDb::new_in_memory()?.with_statement_timeout(Duration::from_millis(20))?;
        let handle = DbHandle::new(db);
        let err = handle
            .call(|_db| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deadline"));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_call_never_runs() -> Result<()> {
        let db = TrackingDb::new_in_memory()?.with_statement_timeout(Duration::from_millis(50))?;
        let handle = DbHandle::new(db);

        // Hold the connection past the deadline of the next call
        let blocker = handle.clone();
        let busy = tokio::spawn(async move {
            blocker
                .call(|_db| {
                    std::thread::sleep(Duration::from_millis(150));
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = handle
            .call(|db| db.insert_order(&new_order("PO-T", 1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deadline"));

        let _ = busy.await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.call(|db| db.get_order("PO-T")).await?.is_none());
        Ok(())
    }

    #[test]
    fn test_oversized_statement_timeout_rejected() -> Result<()> {
        let result = TrackingDb::new_in_memory()?
            .with_statement_timeout(Duration::from_millis(3_000_000_000));
        assert!(result.is_err());
        Ok(())
    }
}
