use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked manufacturing run for one product model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionOrder {
    pub id: String,
    pub model_internal_code: String,
    pub model_internal_name: String,
    pub model_trade_name: String,
    pub order_size: i32,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl ProductionOrder {
    pub fn status(&self) -> OrderStatus {
        match self.end {
            Some(_) => OrderStatus::Closed,
            None => OrderStatus::Open,
        }
    }
}

/// Fields a caller supplies when registering an order. `start` and `end`
/// belong to the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewProductionOrder {
    pub id: String,
    pub model_internal_code: String,
    pub model_internal_name: String,
    pub model_trade_name: String,
    pub order_size: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Result of a conditional close against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(ProductionOrder),
    AlreadyClosed,
    Missing,
}

/// One recorded pass/fail check of a part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inspection {
    pub id: i64,
    pub production_order_id: String,
    pub part_id: i32,
    pub inspector_id: i64,
    pub inspector_name: String,
    pub failure_code: Option<String>,
    pub passed: bool,
    pub comment: String,
    pub date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInspection {
    pub production_order_id: String,
    pub part_id: i32,
    pub inspector_id: i64,
    pub inspector_name: String,
    pub failure_code: Option<String>,
    pub passed: bool,
    pub comment: String,
    pub date_time: DateTime<Utc>,
}

/// Inspection submission as it arrives from the shop floor. Every field is
/// optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InspectionDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureGroup {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Failure {
    pub code: String,
    pub failure_group_code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Seed file layout for the failure taxonomy.
///
/// ```toml
/// [[groups]]
/// code = "DIM"
/// name = "Dimensional"
///
/// [[failures]]
/// code = "DIM-01"
/// failure_group_code = "DIM"
/// name = "Oversize"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FailureTaxonomy {
    #[serde(default)]
    pub groups: Vec<FailureGroup>,
    #[serde(default)]
    pub failures: Vec<Failure>,
}
