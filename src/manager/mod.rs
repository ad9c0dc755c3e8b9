//! Job registry and scan pipeline.
//!
//! The [`JobRegistry`] owns every scan job, admits new ones against a
//! capacity limit and runs each through the [`ScanPipeline`]: candidate
//! enumeration with retries and timeouts, then probing and classification
//! with bounded concurrency.

mod pipeline;
mod registry;
mod retry;
mod slots;

pub use pipeline::{PipelineConfig, ScanPipeline};
pub use registry::{JobRegistry, JobRegistryBuilder, RegistryConfig};
pub use retry::RetryConfig;
pub use slots::JobSlots;
