//! Subcommand implementations.

pub mod auth;
pub mod check;
pub mod list;
pub mod stock;

use stocktake_client::{ClientError, ConfigError, Notice, Operation};
use thiserror::Error;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{title}: {description}")]
    Failed { title: String, description: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Attach the operation that failed, for a user-facing title.
    pub fn during(operation: Operation) -> impl FnOnce(ClientError) -> Self {
        move |err| {
            let notice = Notice::failure(operation, &err);
            Self::Failed {
                title: notice.title,
                description: notice.description.unwrap_or_default(),
            }
        }
    }
}

/// Parse a `key=value` argument.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("warehouseId=3").unwrap(),
            ("warehouseId".to_string(), "3".to_string())
        );
        assert_eq!(
            parse_key_val("search=a=b").unwrap(),
            ("search".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("status").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_failure_titles_follow_operation() {
        let err = CliError::during(Operation::Delete)(ClientError::Conflict(
            "Check is no longer a draft".into(),
        ));
        assert_eq!(err.to_string(), "Delete failed: Check is no longer a draft");
    }
}
