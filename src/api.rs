//! Resilient provider client: bounded timeouts, linear-backoff retries
//! on transient failures, immediate surfacing of 4xx responses.

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Instant;
use serde_json::Value;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use log::{debug, trace, info, warn, error};

use crate::error::{Error, Result};
use crate::retry::{CallTimeout, RetryPolicy, TimeoutTier};

/// One outbound request: endpoint, optional JSON body, budgets.
/// Owned by the client for the duration of `call`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall
{   pub endpoint: String
  , pub payload: Option<Value>
  , pub tier: TimeoutTier
  , pub max_retries: Option<usize>
}

impl ProviderCall
{   pub fn post(endpoint: impl Into<String>, payload: Value) -> Self
    {   ProviderCall
        {   endpoint: endpoint.into()
          , payload: Some(payload)
          , tier: TimeoutTier::Slow
          , max_retries: None
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self
    {   ProviderCall
        {   endpoint: endpoint.into()
          , payload: None
          , tier: TimeoutTier::Fast
          , max_retries: None
        }
    }

    pub fn tier(mut self, tier: TimeoutTier) -> Self
    {   self.tier = tier;
        self
    }

    pub fn retries(mut self, max_retries: usize) -> Self
    {   self.max_retries = Some(max_retries);
        self
    }
}

/// Outcome of a single attempt as seen by the retry loop
#[derive(Debug)]
enum AttemptError
{   /// Connection failure or read timeout
    Network(String)
  , /// 5xx response
    Server
    {   status: u16
      , message: String
    }
  , /// Anything retrying cannot fix
    Fatal(Error)
}

/// Endpoint without its query string; safe to log
pub fn endpoint_label(endpoint: &str) -> &str
{   endpoint.split('?').next().unwrap_or(endpoint)
}

#[derive(Debug, Clone)]
pub struct ApiClient
{   http: reqwest::Client
  , config: Arc<crate::config::GeneratorConfig>
  , policy: RetryPolicy
}

impl ApiClient
{   pub fn new(
      config: Arc<crate::config::GeneratorConfig>
    ) -> Result<Self>
    {   debug!("Creating ApiClient for {}", config.api_base);
        let connect = TimeoutTier::Fast
          .resolve(&config.timeouts)
          .connect;
        let http = reqwest::Client::builder()
          .connect_timeout(connect)
          .build()
          .map_err(|e| Error::Http(e.without_url().to_string()))?;
        let policy = RetryPolicy::from(&config.retry);
        Ok(ApiClient
        {   http
          , config
          , policy
        })
    }

    pub fn config(&self) -> &crate::config::GeneratorConfig
    {   &self.config
    }

    fn timeout_for(&self, tier: TimeoutTier) -> CallTimeout
    {   tier.resolve(&self.config.timeouts)
    }

    /// Issue the call, retrying transient failures, and return the
    /// parsed JSON body
    pub async fn call(&self, call: ProviderCall) -> Result<Value>
    {   let policy = match call.max_retries
        {   Some(n) => self.policy.with_max_retries(n)
          , None => self.policy.clone()
        };
        let timeout = self.timeout_for(call.tier);
        let label = endpoint_label(&call.endpoint).to_string();
        trace!("Provider call to {}: {:?}", label, call.payload);

        let endpoint = call.endpoint.as_str();
        let payload = call.payload.as_ref();
        with_retries(&label, &policy, move || {
          self.attempt_json(endpoint, payload, timeout)
        }).await
    }

    /// Stream a remote file into `out`, retrying like `call`.
    /// `out` is truncated before each attempt.
    pub async fn download_into(
      &self
    , url: &str
    , tier: TimeoutTier
    , out: &mut tokio::fs::File
    ) -> Result<u64>
    {   let timeout = self.timeout_for(tier);
        let label = endpoint_label(url).to_string();
        let policy = self.policy.clone();
        let out = tokio::sync::Mutex::new(out);
        let out = &out;
        with_retries(&label, &policy, move || async move {
          let mut guard = out.lock().await;
          self.attempt_download(url, timeout, &mut **guard).await
        }).await
    }

    async fn send(
      &self
    , endpoint: &str
    , payload: Option<&Value>
    , timeout: CallTimeout
    ) -> std::result::Result<reqwest::Response, AttemptError>
    {   let request = match payload
        {   Some(body) => self.http.post(endpoint).json(body)
          , None => self.http.get(endpoint)
        };
        let response = request
          .query(&[("key", self.config.api_key.as_str())])
          .timeout(timeout.read)
          .send()
          .await
          .map_err(classify_send)?;
        check_status(response).await
    }

    async fn attempt_json(
      &self
    , endpoint: &str
    , payload: Option<&Value>
    , timeout: CallTimeout
    ) -> std::result::Result<Value, AttemptError>
    {   let response = self.send(endpoint, payload, timeout).await?;
        let text = response.text().await.map_err(classify_body)?;
        serde_json::from_str(&text).map_err(|e| {
          AttemptError::Fatal(Error::Parse(e.to_string()))
        })
    }

    async fn attempt_download(
      &self
    , url: &str
    , timeout: CallTimeout
    , out: &mut tokio::fs::File
    ) -> std::result::Result<u64, AttemptError>
    {   let io_err = |e: std::io::Error| AttemptError::Fatal(e.into());
        out.set_len(0).await.map_err(io_err)?;
        out.seek(SeekFrom::Start(0)).await.map_err(io_err)?;

        let mut response = self.send(url, None, timeout).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
          .chunk()
          .await
          .map_err(classify_body)?
        {   out.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(io_err)?;
        debug!("Downloaded {} bytes", written);
        Ok(written)
    }
}

/// Run `attempt_fn` until it succeeds, fails fatally, or the policy
/// runs out of attempts
async fn with_retries<T, F, Fut>(
  label: &str
, policy: &RetryPolicy
, mut attempt_fn: F
) -> Result<T>
where
  F: FnMut() -> Fut
, Fut: Future<Output = std::result::Result<T, AttemptError>>
{   let total = policy.total_attempts();
    let mut last_status = None;
    let mut last = String::from("no attempt made");

    for attempt in 1..=total
    {   let started = Instant::now();
        let result = attempt_fn().await;
        let elapsed = started.elapsed().as_secs_f64();

        match result
        {   Ok(value) => {
              info!("API call OK {} ({:.1}s)", label, elapsed);
              return Ok(value);
            }
          , Err(AttemptError::Fatal(e)) => {
              error!(
                "API call failed {} ({:.1}s): {}",
                label, elapsed, e
              );
              return Err(e);
            }
          , Err(AttemptError::Network(reason)) => {
              warn!(
                "API network failure {} (attempt {}/{}, {:.1}s): {}",
                label, attempt, total, elapsed, reason
              );
              last_status = None;
              last = reason;
              if attempt < total
              {   tokio::time::sleep(
                    policy.backoff_for_attempt(attempt)
                  ).await;
              }
            }
          , Err(AttemptError::Server { status, message }) => {
              warn!(
                "API server error {} {} (attempt {}/{}, {:.1}s)",
                status, label, attempt, total, elapsed
              );
              last_status = Some(status);
              last = message;
              if attempt < total
              {   tokio::time::sleep(
                    policy.server_error_delay()
                  ).await;
              }
            }
        }
    }

    error!("API call to {} failed after {} attempts", label, total);
    Err(Error::TransientProvider
    {   attempts: total
      , status: last_status
      , last
    })
}

/// Errors raised while sending: a refused, reset or half-open
/// connection is worth another attempt
fn classify_send(e: reqwest::Error) -> AttemptError
{   let e = e.without_url();
    if e.is_timeout() || e.is_connect() || e.is_request()
    {   AttemptError::Network(e.to_string())
    } else
    {   AttemptError::Fatal(Error::Http(e.to_string()))
    }
}

/// Errors raised while reading the body: only timeouts and dropped
/// connections are retried
fn classify_body(e: reqwest::Error) -> AttemptError
{   let e = e.without_url();
    if e.is_timeout() || is_dropped_connection(&e)
    {   AttemptError::Network(e.to_string())
    } else
    {   AttemptError::Fatal(Error::Http(e.to_string()))
    }
}

fn is_dropped_connection(e: &(dyn std::error::Error + 'static)) -> bool
{   use std::io::ErrorKind;
    let mut current = Some(e);
    while let Some(err) = current
    {   if let Some(io) = err.downcast_ref::<std::io::Error>()
        {   if matches!(
              io.kind(),
              ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
            )
            {   return true;
            }
        }
        current = err.source();
    }
    false
}

async fn check_status(
  response: reqwest::Response
) -> std::result::Result<reqwest::Response, AttemptError>
{   let status = response.status();
    trace!("Provider response status: {}", status);
    if status.is_success()
    {   return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await
      .unwrap_or_else(|_| "Unknown error".to_string());
    let message = crate::providers::gemini::error_message(&body);

    if status.is_client_error()
    {   error!("API client error {}: {}", code, message);
        Err(AttemptError::Fatal(Error::PermanentProvider
        {   status: code
          , message
        }))
    } else if status.is_server_error()
    {   Err(AttemptError::Server
        {   status: code
          , message
        })
    } else
    {   Err(AttemptError::Fatal(Error::Http(format!(
          "unexpected status {}", code
        ))))
    }
}
