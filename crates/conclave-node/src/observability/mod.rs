//! Observability: logging, metrics, and request middleware.

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::init_logging;
pub use metrics::{CouncilMetrics, METRICS};
pub use middleware::{metrics_handler, metrics_middleware, request_id_middleware, RequestId};
