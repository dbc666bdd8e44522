//! # PlateWatch
//!
//! Real-time defect-risk alerting for plating line sensor streams.
//!
//! PlateWatch polls a sensor endpoint on a fixed interval, normalizes
//! label-prefixed readings such as `TEMP_55.0C`, evaluates AND-joined rule
//! groups against each sample, and keeps a deduplicated notification list
//! that a dashboard reads over a small REST API.
//!
//! ## Architecture
//!
//! - **Alerting**: field normalization, group evaluation, notification dedup
//! - **Source**: HTTP polling with a bounded timeout
//! - **Scheduler**: non-overlapping poll cycles with cancellation
//! - **API**: REST surface for rules, notifications, and status
//! - **Persistence**: JSON state file loaded and saved by the binary
//!
//! ## Quick Start
//!
//! ```bash
//! # Poll the sensor endpoint and serve the API
//! platewatch serve
//!
//! # Evaluate a saved sample once
//! platewatch check --sample sample.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod scheduler;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertEngine, SharedEngine};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::scheduler::Scheduler;
    pub use crate::source::{HttpSampleSource, SampleSource};
}
