//! Confluence REST API client.
//!
//! Wraps a [`Transport`] with retry handling. Transient failures (timeouts,
//! connection errors, 5xx responses) are retried with exponential backoff;
//! client errors are returned immediately.

mod pages;

use std::thread;
use std::time::Duration;

use poster_config::UploadSettings;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// How often and how patiently a request is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.retry_base_delay,
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`.
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&UploadSettings::default())
    }
}

/// Confluence REST API client.
pub struct ConfluenceClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> ConfluenceClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Send a request, retrying transient failures.
    ///
    /// Returns the first 2xx response.
    pub(crate) fn execute(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, ApiError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let failure = match self.transport.send(request) {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if response.is_server_error() => {
                    format!("HTTP {}: {}", response.status, response.body)
                }
                Ok(response) => {
                    return Err(ApiError::Rejected {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(TransportError::Transient(message)) => message,
                Err(TransportError::Fatal(message)) => {
                    return Err(ApiError::TransportExhausted {
                        attempts: attempt,
                        message,
                    });
                }
            };

            if attempt >= max_attempts {
                return Err(ApiError::TransportExhausted {
                    attempts: attempt,
                    message: failure,
                });
            }

            let delay = self.retry.delay_before(attempt);
            warn!(
                method = request.method.as_str(),
                path = request.path,
                attempt,
                ?delay,
                "Request failed, retrying: {failure}"
            );
            thread::sleep(delay);
            attempt += 1;
        }
    }
}

fn decode<D: DeserializeOwned>(response: &ApiResponse) -> Result<D, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
