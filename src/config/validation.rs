//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, value ranges and rule paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a loaded config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream address is empty")]
    EmptyUpstream,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("intercept.content_types is empty")]
    NoContentTypes,

    #[error("intercept.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("invalid rule path '{0}'")]
    InvalidRulePath(String),

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),
}

/// Check a config, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let upstream = config.upstream.address.trim();
    if upstream.is_empty() {
        errors.push(ValidationError::EmptyUpstream);
    } else if upstream.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "upstream.address",
            value: upstream.to_string(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    let intercept = &config.intercept;
    if intercept.enabled && intercept.content_types.iter().all(|t| t.trim().is_empty()) {
        errors.push(ValidationError::NoContentTypes);
    }
    if intercept.max_body_bytes == Some(0) {
        errors.push(ValidationError::ZeroLimit("max_body_bytes"));
    }
    if intercept.channel_capacity == 0 {
        errors.push(ValidationError::ZeroLimit("channel_capacity"));
    }

    for path in config.rules.paths() {
        if path.split('.').any(|segment| segment.is_empty()) {
            errors.push(ValidationError::InvalidRulePath(path.to_string()));
        }
    }

    let observability = &config.observability;
    if observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
