//! Runtime statistics

pub mod metrics;

pub use metrics::{
    SupervisorCounters, SupervisorStats, ThroughputMeter, ThroughputSample,
    DEFAULT_REPORT_INTERVAL,
};
