use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Outbound HTTP capability used by the fetch adapters.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// GET `url` and return the body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// GET `url` and decode the body as JSON regardless of its content type.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::parse(format!("invalid JSON from {url}: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hko-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "GET");

        let res = self.http.get(url).send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })?;

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("Service Unavailable"), "Service Unavailable");
    }

    #[test]
    fn truncate_body_cuts_on_char_boundary() {
        let body = "天".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }
}
