//! ---
//! ce_section: "03-transport-binding"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "Transport binding between marshallers and broker clients."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use ce_core::WireMessage;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

/// Record handed to, or pulled from, a transport client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRecord {
    /// Destination or origin topic.
    pub topic: String,
    /// Partitioning key.
    pub key: Option<String>,
    /// Metadata headers.
    pub headers: IndexMap<String, String>,
    /// Record value.
    pub payload: Option<Bytes>,
}

impl TransportRecord {
    /// Wrap a marshalled message for `topic`.
    pub fn from_message(topic: impl Into<String>, key: Option<String>, message: WireMessage) -> Self {
        Self {
            topic: topic.into(),
            key,
            headers: message.headers,
            payload: message.body,
        }
    }

    /// Header and body view handed back to a marshaller.
    pub fn to_message(&self) -> WireMessage {
        WireMessage {
            headers: self.headers.clone(),
            body: self.payload.clone(),
        }
    }
}

/// Client abstraction implemented by broker and HTTP adapters.
pub trait TransportClient: Send + Sync {
    /// Completion signal returned for a sent record.
    type Ack;
    /// Client failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hand a record to the transport.
    fn send(&self, record: TransportRecord) -> Result<Self::Ack, Self::Error>;
    /// Next pending record on `topic`, if any.
    fn poll(&self, topic: &str) -> Option<TransportRecord>;
    /// Human-readable client name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Position assigned to a record by the [`InMemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Topic the record was appended to.
    pub topic: String,
    /// Partition derived from the record key.
    pub partition: u32,
    /// Offset within the topic.
    pub offset: u64,
}

/// Errors raised by the [`InMemoryBroker`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker no longer accepts records.
    #[error("broker is closed")]
    Closed,
    /// Records need a destination.
    #[error("record topic must not be empty")]
    EmptyTopic,
}

#[derive(Debug, Default)]
struct TopicLog {
    pending: VecDeque<TransportRecord>,
    next_offset: u64,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: IndexMap<String, TopicLog>,
    history: Vec<TransportRecord>,
    closed: bool,
}

/// Mock broker backed by a mutex protected per-topic queue.
///
/// Every accepted record is also appended to a send history so tests can
/// inspect exactly what left the binding.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    partitions: u32,
}

impl InMemoryBroker {
    /// Single-partition broker.
    pub fn new() -> Self {
        Self::with_partitions(1)
    }

    /// Broker spreading keyed records over `partitions` partitions.
    pub fn with_partitions(partitions: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            partitions: partitions.max(1),
        }
    }

    /// Every record accepted so far, in send order.
    pub fn history(&self) -> Vec<TransportRecord> {
        self.state.lock().history.clone()
    }

    /// Number of records waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |log| log.pending.len())
    }

    /// Stop accepting records; pending records can still be polled.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    fn partition_for(&self, key: Option<&str>) -> u32 {
        match key {
            // FNV-1a keeps the assignment stable across runs.
            Some(key) => {
                let hash = key.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
                    (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
                });
                hash % self.partitions
            }
            None => 0,
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClient for InMemoryBroker {
    type Ack = RecordMetadata;
    type Error = BrokerError;

    fn send(&self, record: TransportRecord) -> Result<RecordMetadata, BrokerError> {
        if record.topic.is_empty() {
            return Err(BrokerError::EmptyTopic);
        }
        let partition = self.partition_for(record.key.as_deref());
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        state.history.push(record.clone());
        let log = state.topics.entry(record.topic.clone()).or_default();
        let offset = log.next_offset;
        log.next_offset += 1;
        let topic = record.topic.clone();
        log.pending.push_back(record);
        Ok(RecordMetadata {
            topic,
            partition,
            offset,
        })
    }

    fn poll(&self, topic: &str) -> Option<TransportRecord> {
        self.state
            .lock()
            .topics
            .get_mut(topic)
            .and_then(|log| log.pending.pop_front())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: &str, key: Option<&str>) -> TransportRecord {
        TransportRecord {
            topic: topic.into(),
            key: key.map(str::to_owned),
            headers: IndexMap::new(),
            payload: Some(Bytes::from_static(b"{}")),
        }
    }

    #[test]
    fn in_memory_broker_send_and_poll() {
        let broker = InMemoryBroker::new();
        let first = broker.send(record("binary.t", None)).expect("send succeeds");
        let second = broker.send(record("binary.t", None)).expect("send succeeds");
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(broker.pending("binary.t"), 2);

        assert!(broker.poll("binary.t").is_some());
        assert!(broker.poll("binary.t").is_some());
        assert!(broker.poll("binary.t").is_none());
        assert!(broker.poll("other").is_none());
        assert_eq!(broker.history().len(), 2);
    }

    #[test]
    fn keyed_records_keep_their_partition() {
        let broker = InMemoryBroker::with_partitions(8);
        let a = broker.send(record("t", Some("tenant-7"))).unwrap();
        let b = broker.send(record("t", Some("tenant-7"))).unwrap();
        assert_eq!(a.partition, b.partition);
        assert!(a.partition < 8);
        assert_eq!(broker.send(record("t", None)).unwrap().partition, 0);
    }

    #[test]
    fn closed_broker_rejects_records() {
        let broker = InMemoryBroker::new();
        broker.send(record("t", None)).unwrap();
        broker.close();
        assert_eq!(broker.send(record("t", None)), Err(BrokerError::Closed));
        assert!(broker.poll("t").is_some());
        assert_eq!(broker.send(record("", None)), Err(BrokerError::EmptyTopic));
    }
}
