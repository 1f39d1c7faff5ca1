//! Production-order tracking back-end.
//!
//! ## Overview
//!
//! Production orders are registered, fetched, listed while open and closed
//! over HTTP. Part inspections are recorded against orders and annotated with
//! codes from a static failure taxonomy.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, TraceLayer, startup)   │
//! │          │ <─────── │    └─ api.rs  (handlers, AppState, ApiError)     │
//! └──────────┘          │         │                                        │
//!                       │         │ ProductionOrderService / Inspection... │
//!                       │         v                                        │
//!                       │  service.rs  (validation, DTO expansion)         │
//!                       │         │                                        │
//!                       │         │ ProductionOrderRepository / ...        │
//!                       │         v                                        │
//!                       │  repository.rs  (trait impls over DbHandle)      │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  db.rs  (TrackingDb: rusqlite statements)        │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Order lifecycle
//!
//! `Open --close--> Closed`. An order is open while `end` is absent; closing
//! stamps `end` once and the order never changes again.

pub mod api;
pub mod db;
pub mod models;
pub mod repository;
pub mod server;
pub mod service;
