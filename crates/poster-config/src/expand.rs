//! Environment variable expansion for configuration strings.
//!
//! Supports `${VAR}` (error if unset) and `${VAR:-default}`. Bare `$VAR` is
//! left untouched so passwords containing `$` survive.

use crate::ConfigError;

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}

/// Expand environment variable references in a string.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        std::env::var(var).map(Some).map_err(|_| LookupError {
            var_name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.var_name),
    })
}

/// Expand an optional value.
pub(crate) fn expand_env_opt(
    value: Option<String>,
    field: &str,
) -> Result<Option<String>, ConfigError> {
    value.map(|v| expand_env(&v, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_env("ENG", "confluence.space_key").unwrap(), "ENG");
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        assert_eq!(
            expand_env("pa$$word", "confluence.password").unwrap(),
            "pa$$word"
        );
    }

    #[test]
    fn test_expand_with_default() {
        let result = expand_env(
            "${POSTER_TEST_UNSET_WITH_DEFAULT:-https://wiki.local}",
            "confluence.base_url",
        )
        .unwrap();
        assert_eq!(result, "https://wiki.local");
    }

    #[test]
    fn test_expand_set_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("POSTER_TEST_SPACE", "DOCS");
        }
        let result = expand_env_opt(Some("${POSTER_TEST_SPACE}".to_owned()), "x").unwrap();
        assert_eq!(result.as_deref(), Some("DOCS"));
        unsafe {
            std::env::remove_var("POSTER_TEST_SPACE");
        }
    }

    #[test]
    fn test_none_stays_none() {
        assert_eq!(expand_env_opt(None, "x").unwrap(), None);
    }
}
