//! ---
//! ce_section: "03-transport-binding"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "Transport binding between marshallers and broker clients."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use ce_core::extensions::partitioning;
use ce_core::{CloudEvent, Marshaller};
use tracing::{debug, warn};

use crate::client::{TransportClient, TransportRecord};
use crate::metrics::BindingMetricsExporter;
use crate::{BindingError, Result};

/// Marshals events and hands the records to a [`TransportClient`].
#[derive(Debug)]
pub struct CloudEventProducer<M, C> {
    marshaller: M,
    client: C,
    metrics: Option<BindingMetricsExporter>,
}

impl<M, C> CloudEventProducer<M, C>
where
    C: TransportClient,
{
    /// Bind `marshaller` to `client`.
    pub fn new(marshaller: M, client: C) -> Self {
        Self {
            marshaller,
            client,
            metrics: None,
        }
    }

    /// Report activity to `metrics`.
    pub fn with_metrics(mut self, metrics: BindingMetricsExporter) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Marshal `event` and send it to `topic`.
    ///
    /// The record key is the partitioning extension's key when one is attached.
    pub fn send<T>(&self, topic: &str, event: &CloudEvent<T>) -> Result<C::Ack>
    where
        M: Marshaller<T>,
    {
        let message = match self.marshaller.marshal(event) {
            Ok(message) => message,
            Err(err) => {
                self.observe_failed();
                return Err(err.into());
            }
        };
        let payload_len = message.body.as_ref().map_or(0, |body| body.len());
        let record = TransportRecord::from_message(topic, partition_key(event), message);

        match self.client.send(record) {
            Ok(ack) => {
                debug!(
                    topic,
                    client = self.client.name(),
                    event_id = %event.attributes().id(),
                    mode = %self.marshaller.mode(),
                    "record sent"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.observe_marshalled(payload_len);
                }
                Ok(ack)
            }
            Err(err) => {
                warn!(topic, client = self.client.name(), error = %err, "transport client rejected record");
                self.observe_failed();
                Err(BindingError::client(self.client.name(), err))
            }
        }
    }

    fn observe_failed(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_failed();
        }
    }
}

/// Pulls records from a [`TransportClient`] and unmarshals them.
#[derive(Debug)]
pub struct CloudEventConsumer<M, C> {
    marshaller: M,
    client: C,
    topic: String,
    metrics: Option<BindingMetricsExporter>,
}

impl<M, C> CloudEventConsumer<M, C>
where
    C: TransportClient,
{
    /// Consume `topic` from `client` through `marshaller`.
    pub fn new(marshaller: M, client: C, topic: impl Into<String>) -> Self {
        Self {
            marshaller,
            client,
            topic: topic.into(),
            metrics: None,
        }
    }

    /// Report activity to `metrics`.
    pub fn with_metrics(mut self, metrics: BindingMetricsExporter) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, `None` when nothing is pending.
    ///
    /// A record that fails to unmarshal is consumed and reported as an error.
    pub fn poll<T>(&self) -> Option<Result<CloudEvent<T>>>
    where
        M: Marshaller<T>,
    {
        let record = self.client.poll(&self.topic)?;
        let payload_len = record.payload.as_ref().map_or(0, |body| body.len());
        let result = self.marshaller.unmarshal(&record.to_message());
        match &result {
            Ok(event) => {
                debug!(
                    topic = %self.topic,
                    client = self.client.name(),
                    event_id = %event.attributes().id(),
                    "record received"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.observe_unmarshalled(payload_len);
                }
            }
            Err(err) => {
                warn!(topic = %self.topic, error = %err, "record could not be unmarshalled");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_failed();
                }
            }
        }
        Some(result.map_err(BindingError::from))
    }
}

fn partition_key<T>(event: &CloudEvent<T>) -> Option<String> {
    event
        .extension(partitioning::NAME)
        .and_then(|ext| ext.to_binary().shift_remove(partitioning::PARTITION_KEY))
}

#[cfg(test)]
mod tests {
    use ce_core::{CloudEventBuilder, Partitioning, StructuredMarshaller};
    use prometheus::Registry;

    use super::*;
    use crate::client::{BrokerError, InMemoryBroker};

    fn event(key: Option<&str>) -> CloudEvent<String> {
        let mut builder = CloudEventBuilder::new()
            .with_id("x10")
            .with_source("/source")
            .with_type("event-type")
            .with_data_content_type("text/plain")
            .with_data("hello".to_owned());
        if let Some(key) = key {
            builder = builder.with_extension(Partitioning::new(key));
        }
        builder.build().unwrap()
    }

    #[test]
    fn producer_uses_partitioning_key() {
        let broker = InMemoryBroker::new();
        let producer = CloudEventProducer::new(StructuredMarshaller::new(), broker.clone());
        producer.send("t", &event(Some("tenant-7"))).unwrap();
        producer.send("t", &event(None)).unwrap();

        let history = broker.history();
        assert_eq!(history[0].key.as_deref(), Some("tenant-7"));
        assert_eq!(history[1].key, None);
    }

    #[test]
    fn client_failures_are_wrapped_and_counted() {
        let registry = Registry::new();
        let metrics = BindingMetricsExporter::register(&registry).unwrap();
        let broker = InMemoryBroker::new();
        broker.close();
        let producer = CloudEventProducer::new(StructuredMarshaller::new(), broker)
            .with_metrics(metrics.clone());

        let err = producer.send("t", &event(None)).unwrap_err();
        match &err {
            BindingError::Client { client, source } => {
                assert_eq!(*client, "in_memory");
                assert_eq!(source.to_string(), BrokerError::Closed.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
        let failed = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "cloudevents_failed_total")
            .expect("failed counter registered");
        assert_eq!(failed.get_metric()[0].get_counter().get_value(), 1.0);
    }

    #[test]
    fn consumer_surfaces_bad_records_without_stalling() {
        let broker = InMemoryBroker::new();
        broker
            .send(TransportRecord {
                topic: "t".into(),
                key: None,
                headers: Default::default(),
                payload: Some(bytes::Bytes::from_static(b"not json")),
            })
            .unwrap();
        let producer = CloudEventProducer::new(StructuredMarshaller::new(), broker.clone());
        producer.send("t", &event(None)).unwrap();

        let consumer = CloudEventConsumer::new(StructuredMarshaller::new(), broker, "t");
        let first: Result<CloudEvent<String>> = consumer.poll().expect("record pending");
        assert!(matches!(first, Err(BindingError::Event(ref err)) if err.is_format()));
        let second: CloudEvent<String> = consumer.poll().expect("record pending").unwrap();
        assert_eq!(second, event(None));
        assert!(consumer.poll::<String>().is_none());
    }
}
