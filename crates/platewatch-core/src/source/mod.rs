//! Sensor sample sources
//!
//! The scheduler asks a [`SampleSource`] for the latest reading once per tick.

mod http;

pub use http::HttpSampleSource;

use crate::error::Result;
use crate::models::SensorSample;

/// Something that can produce the latest sensor sample
#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch the latest sample.
    ///
    /// Implementations must bound their own waiting time; a slow source
    /// returns [`crate::Error::Timeout`] rather than hanging the poll cycle.
    async fn poll(&self) -> Result<SensorSample>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}
