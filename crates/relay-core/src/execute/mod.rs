//! Execution engine for relay programs.
//!
//! Runs a shared compiled program on pooled interpreter instances, one call
//! per instance at a time, with per-call deadlines and cancellation.
//!
//! # Architecture
//!
//! ```text
//! Executor::execute(ctx, program)
//!     │
//!     ├── InstancePool::acquire ──► InstanceLease (grows the pool on demand)
//!     │
//!     ├── ExecutionInstance::reset / bind(ctx)
//!     │       └── CallBinding ◄── progress hook (cancellation checkpoint)
//!     │                       ◄── capability::evaluate (fetch deadline)
//!     │
//!     ├── ExecutionInstance::run(program)   shared Arc<AST>, no reparse
//!     │
//!     └── unbind, lease dropped ──► instance checked back in
//! ```
//!
//! # Module Structure
//!
//! - `context` - Call contexts, abort handles and the per-instance call binding
//! - `instance` - Interpreter construction and the reusable instance
//! - `pool` - Grow-on-demand instance pool and RAII leases
//! - `executor` - Single-call orchestration and error translation

mod context;
mod executor;
mod instance;
mod pool;

pub use context::{AbortHandle, CallContext};
pub use executor::Executor;
pub use instance::ExecutionInstance;
pub use pool::{InstanceLease, InstancePool, PoolStats};

pub(crate) use context::CallBinding;
pub(crate) use instance::build_interpreter;
