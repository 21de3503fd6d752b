use prometheus::{Encoder, HistogramOpts, HistogramTimer, HistogramVec, Registry, TextEncoder};

/// Endpoint latency histograms, labelled by `type`, in their own registry
pub struct Metrics {
    registry: Registry,
    endpoint_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let endpoint_duration = HistogramVec::new(
            HistogramOpts::new(
                "endpoint_duration_seconds",
                "Duration how long it takes for each endpoint",
            )
            .namespace("indexerworker")
            .subsystem("client"),
            &["type"],
        )?;

        let registry = Registry::new();
        registry.register(Box::new(endpoint_duration.clone()))?;

        Ok(Self {
            registry,
            endpoint_duration,
        })
    }

    /// Observes the elapsed time under `kind` when the timer is dropped.
    pub fn start_timer(&self, kind: &str) -> HistogramTimer {
        self.endpoint_duration.with_label_values(&[kind]).start_timer()
    }

    /// Prometheus text exposition of everything registered.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
