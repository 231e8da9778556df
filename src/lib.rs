//! Operations analytics for a freight-forwarding desk.
//!
//! Spreadsheet exports of operation records are normalized, reconciled
//! against the store and loaded; reports are computed in memory from the
//! stored dataset and served over REST or printed by the CLI binaries.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod reports;
pub mod store;
pub mod telemetry;
pub mod usage;

pub use error::{OpsError, Result};
