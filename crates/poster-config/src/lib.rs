//! Run configuration for confluence-poster.
//!
//! A [`Configuration`] is built once per run and passed by reference to every
//! component. It is produced by a single validating constructor,
//! [`Configuration::from_raw`], which turns loosely typed inputs (CLI flags,
//! config file values) into a record whose invariants hold for the whole run:
//!
//! - `base_url` is an absolute `http`/`https` URL
//! - exactly one credential pair is present, encoded as [`AuthMode`]
//! - the source path exists
//! - space key and parent title are non-empty
//!
//! [`Configuration::load`] layers an optional `confluence-poster.toml` file
//! under the CLI settings before validating. String values in the file support
//! `${VAR}` and `${VAR:-default}` environment variable expansion.

mod expand;
mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use file::FileConfig;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "confluence-poster.toml";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither or both credential pairs were supplied.
    #[error(
        "exactly one of username/password or key/certificate must be supplied ({0})"
    )]
    AmbiguousOrMissingCredentials(&'static str),
    /// Source file or directory does not exist.
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Base URL is not an absolute http(s) URL.
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Required field is missing or empty.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// Explicit config file not found.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`confluence.password`").
        field: String,
        /// Error message (e.g., "${`CONFLUENCE_PASSWORD`} not set").
        message: String,
    },
}

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Username and password sent as HTTP basic auth.
    BasicAuth {
        /// Account name.
        username: String,
        /// Account password or API token.
        secret: String,
    },
    /// Client certificate presented during the TLS handshake.
    MutualTls {
        /// PEM private key.
        key_path: PathBuf,
        /// PEM certificate (chain).
        cert_path: PathBuf,
    },
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("secret", &"<redacted>")
                .finish(),
            Self::MutualTls {
                key_path,
                cert_path,
            } => f
                .debug_struct("MutualTls")
                .field("key_path", key_path)
                .field("cert_path", cert_path)
                .finish(),
        }
    }
}

/// Upload tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSettings {
    /// Number of documents processed in parallel.
    pub jobs: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub retry_base_delay: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            jobs: 4,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Markup conversion tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConverterSettings {
    /// Code macro colour theme.
    pub code_theme: String,
    /// Whether code macros show line numbers.
    pub line_numbers: bool,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            code_theme: "Midnight".to_owned(),
            line_numbers: true,
        }
    }
}

/// Unvalidated configuration inputs.
///
/// Every field is optional here; [`Configuration::from_raw`] decides what is
/// missing or conflicting. Empty strings count as absent.
#[derive(Debug, Default, Clone)]
pub struct RawConfiguration {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub key_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub source_path: Option<PathBuf>,
    pub parent_title: Option<String>,
    pub space_key: Option<String>,
    pub verbose: bool,
    pub upload: UploadSettings,
    pub converter: ConverterSettings,
}

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Confluence root URL.
    pub base_url: Option<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Client private key path.
    pub key_file: Option<PathBuf>,
    /// Client certificate path.
    pub cert_file: Option<PathBuf>,
    /// File or directory to upload.
    pub source: Option<PathBuf>,
    /// Title of the page new pages are created under.
    pub parent_title: Option<String>,
    /// Space key.
    pub space_key: Option<String>,
    /// Parallel jobs.
    pub jobs: Option<usize>,
    /// Verbose logging.
    pub verbose: bool,
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    base_url: String,
    auth: AuthMode,
    source_path: PathBuf,
    parent_title: String,
    space_key: String,
    verbose: bool,
    upload: UploadSettings,
    converter: ConverterSettings,
}

impl Configuration {
    /// Validate raw inputs into a configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidUrl`] if the base URL is not absolute http(s)
    /// - [`ConfigError::AmbiguousOrMissingCredentials`] unless exactly one
    ///   credential pair is complete
    /// - [`ConfigError::SourceNotFound`] if the source path does not exist
    /// - [`ConfigError::MissingField`] for empty required values
    /// - [`ConfigError::Validation`] for out-of-range upload settings
    pub fn from_raw(raw: RawConfiguration) -> Result<Self, ConfigError> {
        let base_url = validate_base_url(raw.base_url.as_deref())?;
        let auth = resolve_auth(
            raw.username,
            raw.secret,
            raw.key_path,
            raw.cert_path,
        )?;
        let space_key = require_non_empty(raw.space_key, "space_key")?;
        let parent_title = require_non_empty(raw.parent_title, "parent_title")?;

        let source_path = raw
            .source_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingField("source_path"))?;
        if !source_path.exists() {
            return Err(ConfigError::SourceNotFound(source_path));
        }

        validate_upload(&raw.upload)?;

        Ok(Self {
            base_url,
            auth,
            source_path,
            parent_title,
            space_key,
            verbose: raw.verbose,
            upload: raw.upload,
            converter: raw.converter,
        })
    }

    /// Load configuration from file and CLI settings, then validate.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `confluence-poster.toml` in the current directory and its parents;
    /// when none is found only CLI settings are used.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing or env
    /// expansion fails, or the merged values do not validate.
    pub fn load(config_path: Option<&Path>, cli: &CliSettings) -> Result<Self, ConfigError> {
        let file = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            FileConfig::load(path)?
        } else if let Some(discovered) = discover_config() {
            FileConfig::load(&discovered)?
        } else {
            FileConfig::default()
        };

        let mut raw = file.into_raw()?;
        apply_cli_settings(&mut raw, cli);
        Self::from_raw(raw)
    }

    /// Confluence root URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authentication mode.
    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// File or directory to upload.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Title of the page new pages are anchored under.
    pub fn parent_title(&self) -> &str {
        &self.parent_title
    }

    /// Space key.
    pub fn space_key(&self) -> &str {
        &self.space_key
    }

    /// Whether verbose logging was requested.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Upload tuning.
    pub fn upload(&self) -> &UploadSettings {
        &self.upload
    }

    /// Conversion tuning.
    pub fn converter(&self) -> &ConverterSettings {
        &self.converter
    }
}

fn apply_cli_settings(raw: &mut RawConfiguration, cli: &CliSettings) {
    fn set<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
        if let Some(value) = value {
            *target = Some(value.clone());
        }
    }

    set(&mut raw.base_url, cli.base_url.as_ref());
    set(&mut raw.username, cli.username.as_ref());
    set(&mut raw.secret, cli.password.as_ref());
    set(&mut raw.key_path, cli.key_file.as_ref());
    set(&mut raw.cert_path, cli.cert_file.as_ref());
    set(&mut raw.source_path, cli.source.as_ref());
    set(&mut raw.parent_title, cli.parent_title.as_ref());
    set(&mut raw.space_key, cli.space_key.as_ref());
    if let Some(jobs) = cli.jobs {
        raw.upload.jobs = jobs;
    }
    raw.verbose |= cli.verbose;
}

/// Search for config file in current directory and parents.
fn discover_config() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn validate_base_url(value: Option<&str>) -> Result<String, ConfigError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField("base_url"))?;
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: value.to_owned(),
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }

    Ok(value.trim_end_matches('/').to_owned())
}

fn resolve_auth(
    username: Option<String>,
    secret: Option<String>,
    key_path: Option<PathBuf>,
    cert_path: Option<PathBuf>,
) -> Result<AuthMode, ConfigError> {
    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
    let non_empty_path = |p: Option<PathBuf>| p.filter(|p| !p.as_os_str().is_empty());

    let basic = non_empty(username).zip(non_empty(secret));
    let tls = non_empty_path(key_path).zip(non_empty_path(cert_path));

    match (basic, tls) {
        (Some((username, secret)), None) => Ok(AuthMode::BasicAuth { username, secret }),
        (None, Some((key_path, cert_path))) => Ok(AuthMode::MutualTls {
            key_path,
            cert_path,
        }),
        (Some(_), Some(_)) => Err(ConfigError::AmbiguousOrMissingCredentials(
            "both pairs supplied",
        )),
        (None, None) => Err(ConfigError::AmbiguousOrMissingCredentials(
            "no complete pair supplied",
        )),
    }
}

/// Require a string field to be non-empty.
fn require_non_empty(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField(field))
}

fn validate_upload(upload: &UploadSettings) -> Result<(), ConfigError> {
    if upload.jobs == 0 {
        return Err(ConfigError::Validation(
            "upload.jobs must be greater than 0".to_owned(),
        ));
    }
    if upload.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "upload.max_attempts must be greater than 0".to_owned(),
        ));
    }
    if upload.timeout.is_zero() {
        return Err(ConfigError::Validation(
            "upload.timeout_secs must be greater than 0".to_owned(),
        ));
    }
    Ok(())
}
