//! HTTP address lookup through the local proxy

use super::AddressFetcher;
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Fetches the caller's address from a plain-text echo endpoint
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    /// Route requests through the proxy at `proxy_endpoint` (`host:port`)
    pub fn via_proxy(config: &ProbeConfig, proxy_endpoint: &str) -> Result<Self, ProbeError> {
        let proxy_url = format!("{}://{}", config.proxy_scheme, proxy_endpoint);
        let proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|e| ProbeError::Client(format!("invalid proxy {}: {}", proxy_url, e)))?;

        let client = Self::builder(config)
            .proxy(proxy)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        debug!("Address probe configured: {} via {}", config.url, proxy_url);

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Query the endpoint without any proxy
    pub fn direct(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = Self::builder(config)
            .no_proxy()
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    fn builder(config: &ProbeConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl AddressFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<String, ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify)?;
        parse_address(&body)
    }
}

/// Body must be a bare IP address, surrounding whitespace allowed
pub fn parse_address(body: &str) -> Result<String, ProbeError> {
    let trimmed = body.trim();
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| {
            let preview: String = trimmed.chars().take(64).collect();
            ProbeError::Malformed(preview)
        })
}

fn classify(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::ProxyUnavailable(e.to_string())
    } else if e.is_builder() {
        ProbeError::Client(e.to_string())
    } else {
        ProbeError::Network(e.to_string())
    }
}
