//! Rate-limited HTTP fetcher
//!
//! This module handles every outbound read for the crawler, including:
//! - Building HTTP clients with user agent, auth and per-request timeout
//! - Recognising rate-limit responses and waiting out the reset window
//! - Classifying everything else into permanent `FetchError`s

use crate::{FetchError, FetchResult};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Longest error body kept in a `FetchError::Status`
const MAX_ERROR_BODY: usize = 500;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header
/// * `timeout` - Timeout applied to every individual request
/// * `token` - Optional bearer token sent with every request
/// * `accept` - Optional default Accept header
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    token: Option<&str>,
    accept: Option<&'static str>,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();

    if let Some(accept) = accept {
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
    }

    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("API token contains invalid header characters, ignoring it"),
        }
    }

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Computes how long to wait before retrying a rate-limited response
///
/// A response is rate limited when it is HTTP 429, or HTTP 403 carrying
/// either `x-ratelimit-remaining: 0` or a `retry-after` header.
///
/// # Returns
///
/// * `None` - The response is not a rate-limit signal
/// * `Some(wait)` - `retry-after` seconds if present, otherwise the time
///   until `x-ratelimit-reset` plus one second, otherwise `fallback`
pub fn rate_limit_wait(
    status: StatusCode,
    headers: &HeaderMap,
    now: DateTime<Utc>,
    fallback: Duration,
) -> Option<Duration> {
    let remaining_exhausted = header_str(headers, "x-ratelimit-remaining")
        .map(|value| value.trim() == "0")
        .unwrap_or(false);
    let retry_after =
        header_str(headers, "retry-after").and_then(|value| value.trim().parse::<u64>().ok());

    let limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (remaining_exhausted || retry_after.is_some()));
    if !limited {
        return None;
    }

    if let Some(seconds) = retry_after {
        return Some(Duration::from_secs(seconds));
    }

    let reset =
        header_str(headers, "x-ratelimit-reset").and_then(|value| value.trim().parse::<i64>().ok());
    if let Some(reset) = reset {
        let seconds = (reset - now.timestamp()).max(0) as u64;
        return Some(Duration::from_secs(seconds + 1));
    }

    Some(fallback)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Maps a transport-level reqwest error to a permanent fetch failure
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: format!("Connection failed: {}", error),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Wraps an HTTP client with rate-limit aware retries
///
/// Retries are unbounded in count and only triggered by rate-limit
/// responses. Waiting uses `tokio::time::sleep`, so a rate-limited request
/// suspends its own task and nothing else.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    client: Client,
    fallback_wait: Duration,
    max_wait: Duration,
}

impl RateLimitedFetcher {
    pub fn new(client: Client, fallback_wait: Duration, max_wait: Duration) -> Self {
        Self {
            client,
            fallback_wait,
            max_wait,
        }
    }

    /// Sends a request, waiting out rate limits until a non-limited response arrives
    ///
    /// `build` is invoked once per attempt so the same request can be re-sent.
    ///
    /// # Returns
    ///
    /// * `Ok(Response)` - A 2xx response
    /// * `Err(FetchError::NotFound)` - HTTP 404
    /// * `Err(FetchError)` - Any other non-success status or transport failure
    pub async fn send<F>(&self, url: &str, build: F) -> FetchResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let response = build(&self.client)
                .send()
                .await
                .map_err(|e| classify_error(url, e))?;
            let status = response.status();

            if let Some(wait) =
                rate_limit_wait(status, response.headers(), Utc::now(), self.fallback_wait)
            {
                let wait = wait.min(self.max_wait);
                tracing::warn!(
                    url,
                    attempt,
                    status = status.as_u16(),
                    wait_secs = wait.as_secs(),
                    "Rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }

            if !status.is_success() {
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let cut = (0..=MAX_ERROR_BODY)
                        .rev()
                        .find(|i| body.is_char_boundary(*i))
                        .unwrap_or(0);
                    body.truncate(cut);
                }
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            if attempt > 1 {
                tracing::debug!(url, attempt, "Request succeeded after rate-limit wait");
            }

            return Ok(response);
        }
    }

    /// GETs a URL and decodes the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        let response = self.send(url, |client| client.get(url)).await?;
        decode_json(url, response).await
    }

    /// GETs a URL with a specific Accept header and returns the body text
    pub async fn get_text(&self, url: &str, accept: &str) -> FetchResult<String> {
        let response = self
            .send(url, |client| client.get(url).header(ACCEPT, accept))
            .await?;
        response.text().await.map_err(|e| classify_error(url, e))
    }

    /// POSTs a JSON body and decodes the JSON response
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> FetchResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(url, |client| client.post(url).json(body))
            .await?;
        decode_json(url, response).await
    }
}

async fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> FetchResult<T> {
    let body = response.text().await.map_err(|e| classify_error(url, e))?;
    serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        message: e.to_string(),
    })
}
