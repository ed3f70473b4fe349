//! Kafka producer implementing the BrokerPublisher port.
//!
//! Uses rskafka's partition clients directly. Records are routed to a
//! partition by hashing the key, which preserves same-key ordering as long
//! as the configured partition count matches the topic.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use tokio::sync::Mutex;

use crate::ports::{BrokerError, BrokerPublisher};

/// Kafka-backed broker publisher.
pub struct KafkaBrokerPublisher {
    client: Client,
    partitions: i32,
    // Partition clients are created lazily and reused per (topic, partition).
    partition_clients: Mutex<HashMap<(String, i32), Arc<PartitionClient>>>,
}

impl KafkaBrokerPublisher {
    /// Connects to the given bootstrap servers.
    pub async fn connect(
        bootstrap_servers: Vec<String>,
        partitions: i32,
    ) -> Result<Self, BrokerError> {
        let client = ClientBuilder::new(bootstrap_servers)
            .build()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            partitions: partitions.max(1),
            partition_clients: Mutex::new(HashMap::new()),
        })
    }

    fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions as u64) as i32
    }

    async fn partition_client(
        &self,
        topic: &str,
        partition: i32,
    ) -> Result<Arc<PartitionClient>, BrokerError> {
        let mut clients = self.partition_clients.lock().await;
        if let Some(client) = clients.get(&(topic.to_string(), partition)) {
            return Ok(Arc::clone(client));
        }

        let client = self
            .client
            .partition_client(topic, partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let client = Arc::new(client);
        clients.insert((topic.to_string(), partition), Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl BrokerPublisher for KafkaBrokerPublisher {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let partition = self.partition_for(key);
        let client = self.partition_client(topic, partition).await?;

        let record = Record {
            key: Some(key.as_bytes().to_vec()),
            value: Some(payload.to_vec()),
            headers: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        };

        client
            .produce(vec![record], Compression::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(())
    }
}
