pub mod metrics;
pub mod analytics;

pub use metrics::{LiveMetrics, MetricsCollector, PerformanceMetrics};
pub use analytics::{PerformanceAnalytics, ObservabilityLayer};
