//! Catalog build pipeline for phono.
//!
//! Implements the scan, extract, correction, assembly, and persistence
//! phases, plus the rate-limited provider clients and their durable
//! lookup caches.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod merge;
pub mod pipeline;
pub mod providers;
pub mod schedule;
pub mod store;

pub use config::Config;
pub use error::{PipelineError, PipelineResult, ProviderError, ProviderResult};
pub use pipeline::{BuildOutcome, BuildReport, CatalogPipeline, Phase, Progress, Providers};
pub use schedule::CancelFlag;
pub use store::{LocalStore, MediaStore};
