// crates/csig-canary-core/src/runtime/args.rs
// ============================================================================
// Module: Inbound Argument Normalization
// Description: Accepts the loosely shaped driver arguments and types them.
// Purpose: Give dispatch one internal representation per run variant.
// Dependencies: serde_json, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Test drivers send `args` in several shapes:
//! - `env` (or `environment`) is either a string or `{"autograph_env": "..."}`.
//! - `collections` is a comma-separated `bucket/collection` string or a list
//!   of such strings.
//! - `xpi_urls` is a comma-separated string or a list of URLs.
//!
//! [`normalize_args`] folds all of them into a [`RunRequest`]. Exactly one of
//! `collections` and `xpi_urls` must be present. The environment string is
//! kept raw here; resolving it is a separate, fatal step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CollectionScope;
use crate::core::identifiers::IdentifierError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nested environment field used by signing-service drivers.
const AUTOGRAPH_ENV_FIELD: &str = "autograph_env";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Inbound arguments could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    /// Arguments are not a JSON object.
    #[error("run arguments must be an object")]
    NotAnObject,
    /// No environment was supplied.
    #[error("run arguments are missing env")]
    MissingEnvironment,
    /// A field has an unsupported shape.
    #[error("run argument {field} must be {expected}")]
    InvalidShape {
        /// Field name.
        field: &'static str,
        /// Accepted shapes.
        expected: &'static str,
    },
    /// Neither `collections` nor `xpi_urls` was supplied.
    #[error("run arguments need collections or xpi_urls")]
    MissingTargets,
    /// Both `collections` and `xpi_urls` were supplied.
    #[error("run arguments cannot combine collections and xpi_urls")]
    ConflictingTargets,
    /// A target list is empty after splitting.
    #[error("run argument {0} lists no entries")]
    EmptyList(&'static str),
    /// A collection path is malformed.
    #[error("invalid collection path: {0}")]
    InvalidCollection(#[from] IdentifierError),
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Normalized run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Verify content signatures of settings collections.
    ContentSignature {
        /// Raw environment key.
        environment: String,
        /// Targets in input order.
        targets: Vec<CollectionScope>,
    },
    /// Verify addon installs.
    Addon {
        /// Raw environment key.
        environment: String,
        /// XPI URLs in input order.
        xpi_urls: Vec<String>,
    },
}

impl RunRequest {
    /// Returns the raw environment key.
    #[must_use]
    pub fn environment(&self) -> &str {
        match self {
            Self::ContentSignature {
                environment, ..
            }
            | Self::Addon {
                environment, ..
            } => environment,
        }
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes inbound driver arguments.
///
/// # Errors
///
/// Returns [`ArgsError`] when a field is missing, malformed, or conflicting.
pub fn normalize_args(args: &Value) -> Result<RunRequest, ArgsError> {
    let Value::Object(fields) = args else {
        return Err(ArgsError::NotAnObject);
    };
    let env_value = fields.get("env").or_else(|| fields.get("environment"));
    let environment = normalize_environment(env_value)?;
    match (fields.get("collections"), fields.get("xpi_urls")) {
        (Some(_), Some(_)) => Err(ArgsError::ConflictingTargets),
        (None, None) => Err(ArgsError::MissingTargets),
        (Some(collections), None) => {
            let targets = split_list(collections, "collections")?
                .iter()
                .map(|path| CollectionScope::parse(path))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RunRequest::ContentSignature {
                environment,
                targets,
            })
        }
        (None, Some(urls)) => Ok(RunRequest::Addon {
            environment,
            xpi_urls: split_list(urls, "xpi_urls")?,
        }),
    }
}

/// Accepts a plain string or `{"autograph_env": string}`.
fn normalize_environment(value: Option<&Value>) -> Result<String, ArgsError> {
    let raw = match value {
        None | Some(Value::Null) => return Err(ArgsError::MissingEnvironment),
        Some(Value::String(env)) => env.as_str(),
        Some(Value::Object(nested)) => nested
            .get(AUTOGRAPH_ENV_FIELD)
            .and_then(Value::as_str)
            .ok_or(ArgsError::InvalidShape {
                field: "env",
                expected: "a string or {\"autograph_env\": string}",
            })?,
        Some(_) => {
            return Err(ArgsError::InvalidShape {
                field: "env",
                expected: "a string or {\"autograph_env\": string}",
            });
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ArgsError::MissingEnvironment);
    }
    Ok(trimmed.to_string())
}

/// Splits a comma-separated string, or a list of such strings, into entries.
fn split_list(value: &Value, field: &'static str) -> Result<Vec<String>, ArgsError> {
    let shape_error = ArgsError::InvalidShape {
        field,
        expected: "a comma-separated string or a list of strings",
    };
    let chunks: Vec<&str> = match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(|| shape_error.clone()))
            .collect::<Result<_, _>>()?,
        _ => return Err(shape_error),
    };
    let entries: Vec<String> = chunks
        .iter()
        .flat_map(|chunk| chunk.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();
    if entries.is_empty() {
        return Err(ArgsError::EmptyList(field));
    }
    Ok(entries)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn split_list_drops_blank_entries() {
        let entries = split_list(&json!(" a/b , ,c/d,"), "collections").unwrap();
        assert_eq!(entries, vec!["a/b".to_string(), "c/d".to_string()]);
    }

    #[test]
    fn environment_rejects_numbers() {
        assert!(matches!(
            normalize_environment(Some(&json!(5))),
            Err(ArgsError::InvalidShape {
                field: "env",
                ..
            })
        ));
    }
}
