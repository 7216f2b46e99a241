//! Shared HTTP plumbing for the sources: one client, transient retries,
//! status classification and JSON decoding.

use std::time::{Duration, Instant};

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{Result, SourceError};

const USER_AGENT: &str = concat!("UrbanLens/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 200;

/// HTTP client shared by all sources
#[derive(Clone)]
pub struct HttpClient {
    client: ClientWithMiddleware,
}

impl HttpClient {
    /// Create a client with a transport timeout and retry budget for transient failures
    pub fn new(timeout: Duration, max_retries: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// GET a URL and decode its JSON body
    #[instrument(skip(self, url, bearer_token), fields(url = %redact(url)))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<T> {
        let started = Instant::now();
        let mut request = self.client.get(url);
        if let Some(token) = bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(
            "HTTP response received: {} in {:.3}s",
            status,
            started.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Upstream error {}: {}", status, truncate(&body));
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

/// Strip secrets from a URL before it reaches the logs
fn redact(url: &str) -> String {
    match url.find("token=") {
        Some(index) => {
            let (head, tail) = url.split_at(index + "token=".len());
            let rest = tail.find('&').map_or("", |amp| &tail[amp..]);
            format!("{head}***{rest}")
        }
        None => url.to_string(),
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((index, _)) => format!("{}…", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
