//! Fetchers
//!
//! The [`Fetcher`] trait is the only way the rest of Vitrine obtains bytes.
//! A fetcher resolves with a [`Response`] for every completed exchange,
//! including non-2xx ones; it rejects only when the network itself fails.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Method, NetError, Request, Response};

/// Source of network responses
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;

    /// Fetch a URL with GET
    async fn get(&self, url: &str) -> Result<Response, NetError> {
        self.fetch(Request::get(url)).await
    }
}

/// Fetcher backed by a blocking HTTP client running on smol's blocking pool
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, NetError> {
        Self::with_user_agent(&format!("Vitrine/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, NetError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        let client = self.client.clone();
        smol::unblock(move || execute(&client, request)).await
    }
}

fn execute(client: &reqwest::blocking::Client, req: Request) -> Result<Response, NetError> {
    tracing::debug!("HTTP {} {}", req.method.as_str(), req.url);

    let method = match req.method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Patch => reqwest::Method::PATCH,
    };

    let url = reqwest::Url::parse(&req.url).map_err(|_| NetError::InvalidUrl(req.url.clone()))?;

    let mut builder = client.request(method, url);
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = req.body {
        builder = builder.body(body);
    }

    let response = builder.send().map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            NetError::Offline { url: req.url.clone() }
        } else {
            NetError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let body = response
        .bytes()
        .map_err(|e| NetError::Network(e.to_string()))?
        .to_vec();

    let mut resp = Response::new(status.as_u16(), status.canonical_reason().unwrap_or(""), body);
    resp.headers = headers;
    Ok(resp)
}
