//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area.
//! Routers are assembled in [`crate::app`].

pub mod disputes;
pub mod transactions;
pub mod workflows;

use chrono::{DateTime, Utc};
use tvda_core::Timestamp;

/// Render a UTC time in canonical `YYYY-MM-DDTHH:MM:SSZ` form.
pub(crate) fn render_time(at: DateTime<Utc>) -> String {
    Timestamp::from_utc(at).to_string()
}
