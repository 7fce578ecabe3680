// Tool crate - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # schemashift
//!
//! `schemashift` is a CLI tool and library that plans (and optionally
//! applies) the schema side of a migration from an RU-based document
//! database deployment to a vCore-based one.
//!
//! The planning engine lives in [`schemashift_core`]. This crate adds the
//! ambient pieces around it: configuration files, source catalogs, target
//! executors, retries and reporting.
//!
//! ## Shipped collaborators
//!
//! | Role | Type | Notes |
//! |------|------|-------|
//! | Source | `snapshot` | Metadata exported to a JSON file |
//! | Target | `script` | Writes a `mongosh` script |
//! | Target | `recording` | In-memory dry run |
//!
//! ## Quick Start
//!
//! ```bash
//! # Preview the plan
//! schemashift plan --sections sections.yaml --source snapshot.json
//!
//! # Write the target script
//! schemashift apply --sections sections.yaml --source snapshot.json --script plan.js
//! ```
//!
//! ## Sections Example
//!
//! ```yaml
//! sections:
//!   - include: ["*"]
//!     exclude: ["logs.*"]
//!     optimize_compound_indexes: true
//!   - include: ["shop.orders"]
//!     migrate_shard_key: true
//!     co_locate_with: customers
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connectors;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retry;

pub use config::{load_sections, ToolSettings};
pub use connectors::{SourceCatalog, SourceConfig, TargetConfig, TargetExecutor};
pub use error::{Error, Result};
pub use pipeline::{ApplyStats, Pipeline};
pub use report::{render, ReportFormat};
