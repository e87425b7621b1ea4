//! # Product Catalog
//!
//! A normalized product catalog over SQLite: batch CSV ingestion, a
//! one-shot department migration for legacy databases, paginated filtered
//! queries and aggregate statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐
//! │  CSV export │──▶│  Ingestion  │──▶│  SQLite              │
//! └─────────────┘   │  (batches)  │   │  departments         │
//!                   └─────────────┘   │  products            │
//! ┌─────────────┐                     │  products_with_margin│
//! │ Legacy DB   │──▶ Migration ──────▶│                      │
//! └─────────────┘                     └──────────┬───────────┘
//!                                                │ read-only
//!                               ┌────────────────┴─────┐
//!                               ▼                      ▼
//!                        ┌────────────┐         ┌────────────┐
//!                        │   Query    │         │ Aggregation│
//!                        │  Composer  │         │   Engine   │
//!                        └─────┬──────┘         └─────┬──────┘
//!                              └──────┬───────────────┘
//!                                     ▼
//!                              CLI (`catalog`) / HTTP
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog init                        # create database
//! catalog ingest ./products.csv       # load products
//! catalog products --category Jeans --page 2
//! catalog stats
//! catalog serve                       # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed catalog errors |
//! | [`models`] | Validated records and response types |
//! | [`db`] | Database connection |
//! | [`schema`] | Relations, indexes and the margin view |
//! | [`store`] | Catalog Store: department upsert, product insert |
//! | [`ingest`] | Batch CSV ingestion |
//! | [`migrate`] | Legacy department migration |
//! | [`query`] | Paginated, filtered reads |
//! | [`stats`] | Aggregate statistics and health checks |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod schema;
pub mod server;
pub mod stats;
pub mod store;
