//! # tvda-cli — Operator Tooling for Dispute Arbitration
//!
//! Provides the `tvda` command-line interface. Everything runs offline
//! against in-process collaborators; nothing here talks to the payments
//! platform.
//!
//! ## Subcommands
//!
//! - `tvda score`: Aggregate a case file's evidence and print the ruling.
//! - `tvda weights`: Print or validate scoring weights.
//! - `tvda simulate`: Drive a case through the 72-hour workflow on a
//!   manual clock.
//!
//! ```bash
//! tvda score case.yaml --json
//! tvda weights --weights ops/weights.yaml
//! tvda simulate case.yaml --step-hours 12
//! ```

pub mod case_file;
pub mod score;
pub mod simulate;
pub mod weights;

pub use case_file::CaseFile;
