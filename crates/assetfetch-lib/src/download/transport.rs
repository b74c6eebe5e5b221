use eyre::{Result, WrapErr, bail, eyre};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Source of remote content.
///
/// `fetch` resolves once the remote side has accepted the request; errors that
/// happen while the body is transferred are yielded by the stream.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<ByteStream>> + Send;
}

fn parse_url(url: &str) -> Result<Url> {
    let url = Url::parse(url).wrap_err_with(|| format!("Invalid URL {url}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => bail!("Unsupported URL scheme {scheme} in {url}"),
    }
}

/// Key requests are throttled by: scheme, host and effective port.
fn host_key(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| eyre!("URL has no host: {url}"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| eyre!("URL has no port: {url}"))?;
    Ok(format!("{}://{}:{}", url.scheme(), host, port))
}

/// HTTP(S) transport sharing one client, with a bounded number of in-flight
/// requests per host. The URL is requested exactly as given.
pub struct HttpTransport {
    client: Client,
    max_concurrency_per_host: usize,
    host_limits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpTransport {
    pub fn new(max_concurrency_per_host: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("assetfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_concurrency_per_host,
            host_limits: Mutex::new(HashMap::new()),
        })
    }

    fn limit_for(&self, url: &Url) -> Result<Arc<Semaphore>> {
        let key = host_key(url)?;
        let mut limits = self
            .host_limits
            .lock()
            .map_err(|_| eyre!("Host limit cache is poisoned"))?;
        let limit = limits.entry(key).or_insert_with_key(|key| {
            tracing::debug!(host = %key, "Creating request limit");
            Arc::new(Semaphore::new(self.max_concurrency_per_host))
        });
        Ok(limit.clone())
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        let url = parse_url(url)?;
        let limit = self.limit_for(&url)?;

        // Held until the body stream is dropped.
        let permit = limit.acquire_owned().await?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .wrap_err_with(|| format!("Failed to request {url}"))?
            .error_for_status()
            .wrap_err_with(|| format!("Failed to download {url}"))?;
        tracing::trace!(url = %url, status = %response.status(), "Response received");

        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                let _permit = &permit;
                chunk
                    .map(|bytes| bytes.to_vec())
                    .wrap_err_with(|| format!("Failed to read from {url}"))
            })
            .boxed())
    }
}
