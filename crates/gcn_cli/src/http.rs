//! Blocking HTTP transport.

use gcn_core::{GcnError, HttpRequest, HttpResponse, Method, Result, Transport};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Sends requests to a CMS over HTTP.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// A transport for the CMS at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GcnError::Http {
                message: format!("failed to build HTTP client: {}", e),
                status: None,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = builder.query(&request.query);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().map_err(|e| GcnError::Http {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().map_err(|e| GcnError::Http {
            message: format!("failed to read response body: {}", e),
            status: Some(status),
        })?;
        debug!(status, url = %url, "response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
