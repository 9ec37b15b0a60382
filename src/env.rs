//! Environment variable substitution for configuration text
//!
//! `${VAR}` is replaced with the variable's value and must be set.
//! `${VAR:-fallback}` uses `fallback` (possibly empty) when `VAR` is unset,
//! which is how optional secrets such as `credentials_json` are written.

use std::borrow::Cow;
use std::env;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::ConfigError;

/// `${NAME}` or `${NAME:-fallback}`; the fallback cannot contain `}`
static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid pattern")
});

/// Substitute environment variable references in `input`.
///
/// Every unset variable without a fallback is reported in a single error.
///
/// ```ignore
/// use gcs_vfs::env::substitute_env_vars;
///
/// std::env::set_var("GCS_KEY", "{}");
/// let result = substitute_env_vars("credentials_json: '${GCS_KEY}'").unwrap();
/// assert_eq!(result, "credentials_json: '{}'");
/// ```
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    substitute_vars(input, |name| env::var(name).ok())
}

/// Substitute `${VAR}` references using `lookup` in place of the process
/// environment
pub fn substitute_vars<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Vec<String> = Vec::new();

    let output = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing.join(", ")
        )));
    }

    Ok(match output {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    })
}
