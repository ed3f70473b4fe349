//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Invalid provider API key format")]
    InvalidProviderKey,

    #[error("Invalid webhook signing secret format")]
    InvalidWebhookSecret,

    #[error("Signature tolerance must be positive")]
    InvalidSignatureTolerance,

    #[error("Retry attempt limits must be at least 1")]
    InvalidRetryBudget,

    #[error("Broker bootstrap servers must not be empty")]
    MissingBrokerServers,

    #[error("Broker topic must not be empty")]
    MissingBrokerTopic,

    #[error("Broker partition count must be at least 1")]
    InvalidPartitionCount,
}
