//! Sinks for run summaries.

use crate::config::ReporterConfig;
use crate::error::{LemurError, Result};
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub trait Reporter: Send + Sync {
    fn send_event(&self, title: &str, body: &str) -> Result<()>;
}

pub fn from_config(config: &ReporterConfig) -> Result<Arc<dyn Reporter>> {
    match config {
        ReporterConfig::Log => Ok(Arc::new(LogReporter)),
        ReporterConfig::DataDog {
            api_key,
            app_key,
            tags,
            base_url,
        } => Ok(Arc::new(DataDogReporter::new(
            base_url,
            api_key,
            app_key.clone(),
            tags.clone(),
        )?)),
    }
}

/// Writes the summary to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn send_event(&self, title: &str, body: &str) -> Result<()> {
        info!(title = %title, "{body}");
        Ok(())
    }
}

/// Posts the summary to the DataDog events API.
pub struct DataDogReporter {
    client: Client,
    url: String,
    api_key: String,
    app_key: Option<String>,
    tags: Vec<String>,
}

impl DataDogReporter {
    pub fn new(
        base_url: &str,
        api_key: &str,
        app_key: Option<String>,
        tags: Vec<String>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: format!("{}/api/v1/events", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            app_key,
            tags,
        })
    }
}

impl Reporter for DataDogReporter {
    fn send_event(&self, title: &str, body: &str) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .header("DD-API-KEY", &self.api_key)
            .json(&serde_json::json!({
                "title": title,
                "text": body,
                "tags": self.tags,
            }));
        if let Some(app_key) = &self.app_key {
            request = request.header("DD-APPLICATION-KEY", app_key);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LemurError::Reporter(format!(
                "DataDog event rejected with {status}"
            )));
        }
        Ok(())
    }
}
