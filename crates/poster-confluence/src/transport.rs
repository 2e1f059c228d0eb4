//! Request/response seam between the API client and HTTP.
//!
//! [`ConfluenceClient`](crate::ConfluenceClient) talks to a [`Transport`]
//! rather than to `ureq` directly. [`Session`](crate::Session) is the real
//! implementation; tests use an in-memory fake.

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// A REST API request.
///
/// `path` is relative to `{base_url}/rest/api`, e.g. `/content/123`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    /// JSON body.
    pub body: Option<&'a [u8]>,
}

impl<'a> ApiRequest<'a> {
    pub fn get(path: &'a str, query: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            method: Method::Get,
            path,
            query,
            body: None,
        }
    }

    pub fn post(path: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: Method::Post,
            path,
            query: &[],
            body: Some(body),
        }
    }

    pub fn put(path: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: Method::Put,
            path,
            query: &[],
            body: Some(body),
        }
    }
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Failure to complete an exchange at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Timeout, reset or refused connection, I/O error. Worth retrying.
    #[error("{0}")]
    Transient(String),

    /// Anything a retry will not fix (bad URL, TLS failure, ...).
    #[error("{0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Sends API requests.
///
/// Implementations must be shareable across the upload worker threads.
pub trait Transport: Send + Sync {
    /// Perform one exchange. No retries happen at this level.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP response was received. Error
    /// statuses are returned as `Ok` responses.
    fn send(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, TransportError> {
        (**self).send(request)
    }
}
