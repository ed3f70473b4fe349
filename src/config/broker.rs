//! Message broker configuration

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

/// Message broker configuration (Kafka producer + outbox relay)
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Comma-separated bootstrap servers
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,

    /// Topic payment events are published to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Partition count of the topic (used for key-based partitioning)
    #[serde(default = "default_partitions")]
    pub partitions: i32,

    /// Synchronous publish attempts before falling back to the outbox
    #[serde(default = "default_publish_max_attempts")]
    pub publish_max_attempts: u32,

    /// Hard deadline for the synchronous publish portion, in seconds
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Base retry backoff, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry backoff cap, in seconds
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,

    /// Outbox relay poll interval, in milliseconds
    #[serde(default = "default_outbox_poll_interval_ms")]
    pub outbox_poll_interval_ms: u64,

    /// Maximum outbox tasks fetched per poll cycle
    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: u32,

    /// Relay delivery attempts before a task is dead-lettered
    #[serde(default = "default_outbox_max_attempts")]
    pub outbox_max_attempts: u32,
}

impl BrokerConfig {
    /// Bootstrap servers as a list
    pub fn bootstrap_server_list(&self) -> Vec<String> {
        self.bootstrap_servers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Base backoff as a Duration
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff cap as a Duration
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    /// Synchronous publish deadline as a Duration
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Outbox poll interval as a Duration
    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_poll_interval_ms)
    }

    /// Validate broker configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bootstrap_server_list().is_empty() {
            return Err(ValidationError::MissingBrokerServers);
        }
        if self.topic.trim().is_empty() {
            return Err(ValidationError::MissingBrokerTopic);
        }
        if self.partitions < 1 {
            return Err(ValidationError::InvalidPartitionCount);
        }
        if self.publish_max_attempts == 0 || self.outbox_max_attempts == 0 {
            return Err(ValidationError::InvalidRetryBudget);
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
            partitions: default_partitions(),
            publish_max_attempts: default_publish_max_attempts(),
            publish_timeout_secs: default_publish_timeout(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_secs: default_backoff_cap_secs(),
            outbox_poll_interval_ms: default_outbox_poll_interval_ms(),
            outbox_batch_size: default_outbox_batch_size(),
            outbox_max_attempts: default_outbox_max_attempts(),
        }
    }
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "payment_events".to_string()
}

fn default_partitions() -> i32 {
    1
}

fn default_publish_max_attempts() -> u32 {
    3
}

fn default_publish_timeout() -> u64 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_secs() -> u64 {
    30
}

fn default_outbox_poll_interval_ms() -> u64 {
    100
}

fn default_outbox_batch_size() -> u32 {
    100
}

fn default_outbox_max_attempts() -> u32 {
    10
}
