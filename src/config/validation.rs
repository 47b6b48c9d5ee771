//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are
//! collected rather than stopping at the first one.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::{backend::BackendAddr, Strategy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listen port '{0}' is not a valid port number")]
    InvalidPort(String),

    #[error("server #{index}: {reason}")]
    InvalidServer { index: usize, reason: String },

    #[error("server {0} is listed more than once")]
    DuplicateServer(String),

    #[error("{weights} weights given for {servers} servers")]
    WeightCount { servers: usize, weights: usize },

    #[error("weight for server #{0} must be at least 1")]
    ZeroWeight(usize),

    #[error("{field} '{value}' is not a valid duration: {reason}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("health check path '{0}' must start with '/'")]
    InvalidHealthPath(String),

    #[error("ring.replicas must be at least 1")]
    ZeroReplicas,

    #[error("metrics address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Parse a non-zero duration string.
pub fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ValidationError> {
    let duration = humantime::parse_duration(value.trim()).map_err(|e| {
        ValidationError::InvalidDuration {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    if duration.is_zero() {
        return Err(ValidationError::ZeroDuration(field));
    }
    Ok(duration)
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen_port.trim().parse::<u16>().is_err() {
        errors.push(ValidationError::InvalidPort(config.listen_port.clone()));
    }

    let mut seen = HashSet::new();
    for (index, server) in config.servers.iter().enumerate() {
        match BackendAddr::parse(server) {
            Ok(addr) => {
                if !seen.insert(addr.identity().to_string()) {
                    errors.push(ValidationError::DuplicateServer(addr.identity().to_string()));
                }
            }
            Err(e) => errors.push(ValidationError::InvalidServer {
                index,
                reason: e.to_string(),
            }),
        }
    }

    if !config.weights.is_empty() && config.weights.len() != config.servers.len() {
        errors.push(ValidationError::WeightCount {
            servers: config.servers.len(),
            weights: config.weights.len(),
        });
    }
    for (index, weight) in config.weights.iter().enumerate() {
        if *weight == 0 {
            errors.push(ValidationError::ZeroWeight(index));
        }
    }

    let health = &config.health_check;
    if let Err(e) = parse_duration("health_check.interval", &health.interval) {
        errors.push(e);
    }
    if let Err(e) = parse_duration("health_check.timeout", &health.timeout) {
        errors.push(e);
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(health.path.clone()));
    }

    if config.timeouts.connect.is_zero() {
        errors.push(ValidationError::ZeroDuration("timeouts.connect"));
    }
    if config.timeouts.request.is_zero() {
        errors.push(ValidationError::ZeroDuration("timeouts.request"));
    }

    if config.ring.replicas == 0 {
        errors.push(ValidationError::ZeroReplicas);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    // An unknown strategy is a wiring defect reported per request, not fatal.
    if config.strategy.parse::<Strategy>().is_err() {
        tracing::warn!(
            strategy = %config.strategy,
            "Unknown load balancing strategy, every proxied request will be rejected"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProxyConfig {
        ProxyConfig {
            servers: vec!["http://127.0.0.1:5001".into(), "http://127.0.0.1:5002".into()],
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
        assert_eq!(validate_config(&config()), Ok(()));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = config();
        config.listen_port = "http".into();
        config.weights = vec![1];
        config.health_check.interval = "soon".into();
        config.ring.replicas = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidPort("http".into())));
        assert!(errors.contains(&ValidationError::WeightCount {
            servers: 2,
            weights: 1
        }));
        assert!(errors.contains(&ValidationError::ZeroReplicas));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidDuration { field: "health_check.interval", .. })));
    }

    #[test]
    fn rejects_bad_servers() {
        let mut config = config();
        config.servers.push("https://secure.example".into());
        config.servers.push("127.0.0.1:5001".into());
        config.weights = vec![1, 0, 1, 1];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateServer("127.0.0.1:5001".into())));
        assert!(errors.contains(&ValidationError::ZeroWeight(1)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidServer { index: 2, .. })));
    }

    #[test]
    fn durations() {
        assert_eq!(
            parse_duration("x", "1500ms").unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(parse_duration("x", "0s"), Err(ValidationError::ZeroDuration("x")));
        assert!(parse_duration("x", "5 parsecs").is_err());
    }

    #[test]
    fn unknown_strategy_is_not_fatal() {
        let mut config = config();
        config.strategy = "random".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
