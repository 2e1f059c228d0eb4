//! `confluence-poster.toml` file layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::expand::{expand_env, expand_env_opt};
use crate::{ConfigError, ConverterSettings, RawConfiguration, UploadSettings};

/// Configuration file contents as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// Enable debug logging, same as `-v`.
    verbose: bool,
    confluence: ConfluenceSection,
    upload: UploadSection,
    converter: ConverterSection,

    /// Directory of the loaded file, for resolving relative paths.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfluenceSection {
    base_url: Option<String>,
    space_key: Option<String>,
    parent_title: Option<String>,
    username: Option<String>,
    password: Option<String>,
    key_file: Option<String>,
    cert_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UploadSection {
    source: Option<String>,
    jobs: Option<usize>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConverterSection {
    code_theme: Option<String>,
    line_numbers: Option<bool>,
}

impl FileConfig {
    /// Load configuration from a specific file.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.base_dir = Some(path.parent().unwrap_or(Path::new(".")).to_path_buf());
        Ok(config)
    }

    /// Expand environment variables and resolve paths into raw inputs.
    pub(crate) fn into_raw(self) -> Result<RawConfiguration, ConfigError> {
        let Self {
            verbose,
            confluence,
            upload,
            converter,
            base_dir,
        } = self;
        let resolve = |value: Option<String>| -> Option<PathBuf> {
            value.map(|v| match &base_dir {
                Some(dir) => dir.join(v),
                None => PathBuf::from(v),
            })
        };

        let defaults = UploadSettings::default();
        let upload_settings = UploadSettings {
            jobs: upload.jobs.unwrap_or(defaults.jobs),
            timeout: upload
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            max_attempts: upload.max_attempts.unwrap_or(defaults.max_attempts),
            retry_base_delay: upload
                .retry_base_delay_ms
                .map_or(defaults.retry_base_delay, Duration::from_millis),
        };

        let converter_defaults = ConverterSettings::default();
        let converter_settings = ConverterSettings {
            code_theme: match converter.code_theme {
                Some(theme) => expand_env(&theme, "converter.code_theme")?,
                None => converter_defaults.code_theme,
            },
            line_numbers: converter
                .line_numbers
                .unwrap_or(converter_defaults.line_numbers),
        };

        Ok(RawConfiguration {
            base_url: expand_env_opt(confluence.base_url, "confluence.base_url")?,
            username: expand_env_opt(confluence.username, "confluence.username")?,
            secret: expand_env_opt(confluence.password, "confluence.password")?,
            key_path: resolve(expand_env_opt(confluence.key_file, "confluence.key_file")?),
            cert_path: resolve(expand_env_opt(confluence.cert_file, "confluence.cert_file")?),
            source_path: resolve(expand_env_opt(upload.source, "upload.source")?),
            parent_title: expand_env_opt(confluence.parent_title, "confluence.parent_title")?,
            space_key: expand_env_opt(confluence.space_key, "confluence.space_key")?,
            verbose,
            upload: upload_settings,
            converter: converter_settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_empty_file() {
        let config: FileConfig = toml::from_str("").unwrap();
        let raw = config.into_raw().unwrap();
        assert_eq!(raw.base_url, None);
        assert_eq!(raw.upload, UploadSettings::default());
        assert_eq!(raw.converter, ConverterSettings::default());
    }

    #[test]
    fn test_parse_all_sections() {
        let toml = r#"
[confluence]
base_url = "https://confluence.example.com"
space_key = "ENG"
parent_title = "Engineering Docs"
key_file = "certs/client.key"
cert_file = "/etc/pki/client.crt"

[upload]
source = "docs"
jobs = 2
timeout_secs = 10
max_attempts = 5
retry_base_delay_ms = 50

[converter]
code_theme = "Eclipse"
line_numbers = false
"#;
        let mut config: FileConfig = toml::from_str(toml).unwrap();
        config.base_dir = Some(PathBuf::from("/project"));
        let raw = config.into_raw().unwrap();

        assert_eq!(raw.base_url.as_deref(), Some("https://confluence.example.com"));
        assert_eq!(raw.space_key.as_deref(), Some("ENG"));
        assert_eq!(raw.parent_title.as_deref(), Some("Engineering Docs"));
        assert_eq!(raw.key_path, Some(PathBuf::from("/project/certs/client.key")));
        assert_eq!(raw.cert_path, Some(PathBuf::from("/etc/pki/client.crt")));
        assert_eq!(raw.source_path, Some(PathBuf::from("/project/docs")));
        assert_eq!(
            raw.upload,
            UploadSettings {
                jobs: 2,
                timeout: Duration::from_secs(10),
                max_attempts: 5,
                retry_base_delay: Duration::from_millis(50),
            }
        );
        assert_eq!(raw.converter.code_theme, "Eclipse");
        assert!(!raw.converter.line_numbers);
    }

    #[test]
    fn test_verbose_key() {
        let config: FileConfig = toml::from_str("verbose = true\n\n[upload]\njobs = 1\n").unwrap();
        let raw = config.into_raw().unwrap();
        assert!(raw.verbose);
        assert_eq!(raw.upload.jobs, 1);

        let config: FileConfig = toml::from_str("").unwrap();
        assert!(!config.into_raw().unwrap().verbose);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("[confluence]\nspace = \"ENG\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_password_from_env() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("POSTER_TEST_PASSWORD", "s3cret");
        }
        let toml = r#"
[confluence]
username = "bot"
password = "${POSTER_TEST_PASSWORD}"
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        let raw = config.into_raw().unwrap();
        assert_eq!(raw.secret.as_deref(), Some("s3cret"));
        unsafe {
            std::env::remove_var("POSTER_TEST_PASSWORD");
        }
    }

    #[test]
    fn test_unset_env_var_is_error() {
        let toml = r#"
[confluence]
password = "${POSTER_TEST_SURELY_UNSET}"
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        let err = config.into_raw().unwrap_err();
        match err {
            ConfigError::EnvVar { field, message } => {
                assert_eq!(field, "confluence.password");
                assert!(message.contains("POSTER_TEST_SURELY_UNSET"));
            }
            other => panic!("expected EnvVar error, got {other:?}"),
        }
    }
}
