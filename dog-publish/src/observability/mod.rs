pub mod layer;
pub mod metrics;

pub use layer::ObservabilityLayer;
pub use metrics::{LiveMetrics, MetricsSnapshot};
