pub mod probe_metrics;

pub use probe_metrics::ProbeMetrics;
