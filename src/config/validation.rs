//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream target is a forwardable base URL
//! - Check addresses and header names parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterceptorConfig → Result<(), Vec<ValidationError>>

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::{is_bind_address, parse_bind_address, InterceptorConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.target `{0}` is not a valid URL")]
    TargetUrl(String),

    #[error("upstream.target `{0}` must use the http scheme (https upstreams are not supported)")]
    TargetScheme(String),

    #[error("upstream.target `{0}` must not carry a query or fragment")]
    TargetSuffix(String),

    #[error("listener.bind_address `{0}` is not a host:port address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("capture.id_header `{0}` is not a valid header name")]
    IdHeader(String),

    #[error("capture.max_request_body_bytes must be greater than zero")]
    BodyLimit,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &InterceptorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_target(&config.upstream.target) {
        errors.push(e);
    }

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && parse_bind_address(&config.observability.metrics_address).is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let id_header = &config.capture.id_header;
    if !id_header.is_empty() && HeaderName::from_bytes(id_header.as_bytes()).is_err() {
        errors.push(ValidationError::IdHeader(id_header.clone()));
    }

    if config.capture.max_request_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_target(target: &str) -> Result<(), ValidationError> {
    let url = Url::parse(target).map_err(|_| ValidationError::TargetUrl(target.to_string()))?;
    if url.scheme() != "http" {
        return Err(ValidationError::TargetScheme(target.to_string()));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::TargetUrl(target.to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::TargetSuffix(target.to_string()));
    }
    Ok(())
}
