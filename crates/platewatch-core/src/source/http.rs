//! HTTP polling source

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::SensorSample;

use super::SampleSource;

/// Polls a JSON endpoint for the latest sample
#[derive(Clone, Debug)]
pub struct HttpSampleSource {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpSampleSource {
    /// Create a source for `url` with a per-request timeout
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::config(format!("invalid source url: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("platewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Create a source from configuration
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(&config.url, config.timeout)
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Http(err)
        }
    }
}

#[async_trait::async_trait]
impl SampleSource for HttpSampleSource {
    async fn poll(&self) -> Result<SensorSample> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;

        let body: Value = response.json().await.map_err(|e| self.classify(e))?;
        let sample = SensorSample::from_envelope(body).ok_or(Error::EmptyPayload)?;

        debug!(url = %self.url, fields = sample.len(), "Polled sensor sample");
        Ok(sample)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
