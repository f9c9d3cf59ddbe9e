//! Core engine for relay, a concurrent host for hot-swappable scripts.
//!
//! This crate provides:
//! - Compilation of rhai scripts into shareable programs
//! - A grow-on-demand pool of interpreter instances
//! - Per-call deadlines and cooperative cancellation
//! - Host capabilities (`hash`, `evaluate`, `version`) bound into every instance
//! - A locator-keyed model cache with adaptive replacement

pub mod cache;
pub mod capability;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod execute;
pub mod fetch;
pub mod model;
pub mod value;

pub use cache::{ArcCache, ResourceCache};
pub use capability::{CapabilityRegistry, hash64};
pub use compile::{CompiledProgram, Compiler};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{CapabilityError, Error, Result};
pub use execute::{AbortHandle, CallContext, Executor, InstancePool, PoolStats};
pub use fetch::{DefaultFetcher, FetchError, Fetcher};
pub use model::{ModelError, ModelParser, PmmlParser, TreeModel};
pub use value::{Feature, Features, Value};
