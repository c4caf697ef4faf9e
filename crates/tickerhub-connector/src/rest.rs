//! Shared REST driver.

use crate::error::{ConnectorError, ConnectorResult};
use reqwest::Client;
use tickerhub_core::{Symbol, TickerData};
use tickerhub_feed::{NormalizeContext, RestRequest, WireProtocol};
use tracing::debug;

/// Issues a protocol's requests for one symbol and normalizes the bodies.
pub struct RestClient {
    client: Client,
    base_url: String,
    protocol: &'static dyn WireProtocol,
}

impl RestClient {
    pub fn new(client: Client, base_url: impl Into<String>, protocol: &'static dyn WireProtocol) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            protocol,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and normalize the ticker for `symbol`.
    pub async fn fetch_ticker(&self, symbol: &Symbol) -> ConnectorResult<TickerData> {
        let requests = self.protocol.rest_requests(symbol)?;

        let mut bodies = Vec::with_capacity(requests.len());
        for request in &requests {
            bodies.push(self.get_json(request).await?);
        }

        let ctx = NormalizeContext::now().with_symbol(symbol.clone());
        Ok(self.protocol.normalize_rest(&bodies, &ctx)?)
    }

    async fn get_json(&self, request: &RestRequest) -> ConnectorResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(%url, query = ?request.query, "REST request");

        let response = self
            .client
            .get(&url)
            .query(&request.query)
            .send()
            .await
            .map_err(|e| ConnectorError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Http(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ConnectorError::Http(format!("Failed to parse response: {e}")))
    }
}
