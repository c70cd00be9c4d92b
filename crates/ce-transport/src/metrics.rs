//! ---
//! ce_section: "03-transport-binding"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "Transport binding between marshallers and broker clients."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Prometheus metric handles for binding activity.
#[derive(Clone)]
pub struct BindingMetricsExporter {
    marshalled: IntCounter,
    unmarshalled: IntCounter,
    failed: IntCounter,
    payload_bytes: Histogram,
}

impl BindingMetricsExporter {
    /// Register binding metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let marshalled = IntCounter::with_opts(Opts::new(
            "cloudevents_marshalled_total",
            "Events marshalled and handed to a transport client",
        ))?;
        let unmarshalled = IntCounter::with_opts(Opts::new(
            "cloudevents_unmarshalled_total",
            "Events rebuilt from transport records",
        ))?;
        let failed = IntCounter::with_opts(Opts::new(
            "cloudevents_failed_total",
            "Events that failed to marshal, unmarshal or send",
        ))?;
        let payload_bytes = Histogram::with_opts(
            HistogramOpts::new(
                "cloudevents_payload_bytes",
                "Size of record payloads crossing the binding",
            )
            .buckets(prometheus::exponential_buckets(64.0, 4.0, 8)?),
        )?;

        registry.register(Box::new(marshalled.clone()))?;
        registry.register(Box::new(unmarshalled.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(payload_bytes.clone()))?;

        Ok(Self {
            marshalled,
            unmarshalled,
            failed,
            payload_bytes,
        })
    }

    /// Record an event sent through the binding.
    pub fn observe_marshalled(&self, payload_len: usize) {
        self.marshalled.inc();
        self.payload_bytes.observe(payload_len as f64);
    }

    /// Record an event received through the binding.
    pub fn observe_unmarshalled(&self, payload_len: usize) {
        self.unmarshalled.inc();
        self.payload_bytes.observe(payload_len as f64);
    }

    /// Record a failed operation.
    pub fn observe_failed(&self) {
        self.failed.inc();
    }
}

impl std::fmt::Debug for BindingMetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingMetricsExporter")
            .field("marshalled", &self.marshalled.get())
            .field("unmarshalled", &self.unmarshalled.get())
            .field("failed", &self.failed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_exporter_records_counts() {
        let registry = Registry::new();
        let metrics = BindingMetricsExporter::register(&registry).expect("register metrics");
        metrics.observe_marshalled(120);
        metrics.observe_unmarshalled(120);
        metrics.observe_failed();

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "cloudevents_marshalled_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "cloudevents_payload_bytes"));
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Registry::new();
        BindingMetricsExporter::register(&registry).expect("first registration");
        assert!(BindingMetricsExporter::register(&registry).is_err());
    }
}
