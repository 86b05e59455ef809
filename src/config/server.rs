//! Scrape endpoint settings.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the metrics listener binds to.
    pub listen: SocketAddr,

    /// HTTP path serving the exposition.
    #[validate(custom(function = "validate_path"))]
    pub path: String,
}

fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && path.len() > 1 {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_metrics_path");
    err.message = Some(format!("Metrics path must start with '/' and not be the root: {}", path).into());
    Err(err)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9090)),
            path: "/metrics".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_9090() {
        let server = ServerConfig::default();
        assert_eq!(server.listen.port(), 9090);
        assert_eq!(server.path, "/metrics");
        assert!(server.validate().is_ok());
    }

    #[test]
    fn path_must_be_absolute_and_not_root() {
        for bad in ["metrics", "/", ""] {
            let server = ServerConfig {
                path: bad.to_string(),
                ..Default::default()
            };
            assert!(server.validate().is_err(), "{bad:?} should be rejected");
        }
    }
}
