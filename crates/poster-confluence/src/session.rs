//! Authenticated HTTP session.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use poster_config::{AuthMode, Configuration};
use ureq::{Agent, RequestBuilder};

use crate::error::SessionError;
use crate::tls::client_tls_config;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};

/// Builds a [`Session`] from the run configuration.
pub struct SessionBuilder;

impl SessionBuilder {
    /// Create a session for the configured server and credentials.
    ///
    /// Basic auth attaches an `Authorization` header to every request. Mutual
    /// TLS loads the client certificate and key up front so problems surface
    /// before any upload starts.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CertificateLoad`] if a certificate or key file
    /// cannot be read or parsed, and [`SessionError::KeyCertMismatch`] if an
    /// RSA key does not belong to the certificate.
    pub fn build(config: &Configuration) -> Result<Session, SessionError> {
        let timeout = config.upload().timeout;
        let (agent, authorization) = match config.auth() {
            AuthMode::BasicAuth { username, secret } => {
                (agent(timeout, None), Some(basic_authorization(username, secret)))
            }
            AuthMode::MutualTls {
                key_path,
                cert_path,
            } => {
                let tls = client_tls_config(key_path, cert_path)?;
                tracing::debug!(cert = %cert_path.display(), "Loaded client certificate");
                (agent(timeout, Some(tls)), None)
            }
        };

        Ok(Session {
            agent,
            base_url: config.base_url().to_owned(),
            authorization,
        })
    }
}

fn agent(timeout: Duration, tls: Option<ureq::tls::TlsConfig>) -> Agent {
    let mut config = Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false);
    if let Some(tls) = tls {
        config = config.tls_config(tls);
    }
    config.build().into()
}

fn basic_authorization(username: &str, secret: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{secret}")))
}

/// HTTP session bound to one Confluence server.
///
/// Cheap to share: the underlying agent pools connections and is safe to use
/// from several threads.
pub struct Session {
    agent: Agent,
    base_url: String,
    authorization: Option<String>,
}

impl Session {
    /// Server root URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api{path}", self.base_url)
    }

    fn prepare<B>(&self, builder: RequestBuilder<B>, request: &ApiRequest<'_>) -> RequestBuilder<B> {
        let mut builder = builder
            .header("Accept", "application/json")
            .query_pairs(request.query.iter().copied());
        if let Some(authorization) = &self.authorization {
            builder = builder.header("Authorization", authorization);
        }
        builder
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("basic_auth", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}

impl Transport for Session {
    fn send(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, TransportError> {
        let url = self.api_url(request.path);
        tracing::debug!(method = request.method.as_str(), %url, "Sending request");

        let body = request.body.unwrap_or_default();
        let result = match request.method {
            Method::Get => self.prepare(self.agent.get(&url), request).call(),
            Method::Post => self
                .prepare(self.agent.post(&url), request)
                .header("Content-Type", "application/json")
                .send(body),
            Method::Put => self
                .prepare(self.agent.put(&url), request)
                .header("Content-Type", "application/json")
                .send(body),
        };

        let response = result.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(classify)?;
        Ok(ApiResponse { status, body })
    }
}

/// Sort ureq failures into retryable and final.
fn classify(err: ureq::Error) -> TransportError {
    match &err {
        ureq::Error::Timeout(_) | ureq::Error::Io(_) | ureq::Error::ConnectionFailed => {
            TransportError::Transient(err.to_string())
        }
        _ => TransportError::Fatal(err.to_string()),
    }
}
