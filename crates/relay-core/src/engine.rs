//! The embedding façade.

use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};

use crate::capability::CapabilityRegistry;
use crate::compile::{CompiledProgram, Compiler};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::execute::{CallContext, Executor, InstancePool, PoolStats};
use crate::fetch::{DefaultFetcher, Fetcher};
use crate::model::PmmlParser;
use crate::value::Value;

#[derive(Default)]
struct Published {
    current: Option<Arc<CompiledProgram>>,
    next_version: u64,
}

/// Owns the current program, the instance pool and the capability set.
///
/// `Engine` is `Send + Sync`; share it by reference or `Arc`. Each engine is
/// independent of every other engine in the process.
///
/// # Example
///
/// ```
/// use relay_core::{CallContext, Engine, EngineConfig};
///
/// let engine = Engine::new(EngineConfig::default());
/// engine.update_str(r#"capability::hash("a")"#).unwrap();
///
/// let value = engine.execute(&CallContext::background()).unwrap();
/// assert_eq!(value.as_u64(), Some(0x8555_5565_f659_7889));
/// engine.close().unwrap();
/// ```
pub struct Engine {
    compiler: Compiler,
    executor: Executor,
    program: RwLock<Published>,
    capabilities: Arc<CapabilityRegistry>,
}

impl Engine {
    /// An engine resolving locators with [`DefaultFetcher`].
    pub fn new(config: EngineConfig) -> Self {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::new()))
    }

    /// An engine resolving `capability::evaluate` locators through `fetcher`.
    pub fn with_fetcher(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let capabilities = Arc::new(CapabilityRegistry::new(
            &config,
            fetcher,
            Arc::new(PmmlParser::with_max_depth(config.max_model_depth)),
        ));
        let compiler = Compiler::new(&config, &capabilities);
        let warm = config.warm_instances;
        let pool = InstancePool::with_warm_instances(config, Arc::clone(&capabilities), warm);

        Self {
            compiler,
            executor: Executor::new(pool),
            program: RwLock::new(Published::default()),
            capabilities,
        }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Run the current program once.
    ///
    /// The call completes against the program that was current when it
    /// started, even if [`update`](Self::update) publishes another meanwhile.
    pub fn execute(&self, ctx: &CallContext) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let program = self
            .current()
            .ok_or_else(|| Error::execution("no program loaded"))?;
        self.executor.execute(ctx, &program)
    }

    /// Compile `source` and publish it as the current program.
    ///
    /// On failure the previous program stays current. Returns the new
    /// program's version.
    pub fn update(&self, source: impl Read) -> Result<u64> {
        self.update_named(source, "script")
    }

    pub fn update_str(&self, source: &str) -> Result<u64> {
        self.update(source.as_bytes())
    }

    /// Like [`update`](Self::update), naming the source in compile errors.
    pub fn update_named(&self, source: impl Read, name: &str) -> Result<u64> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        match self.compiler.compile(source, name) {
            Ok(program) => Ok(self.publish(program)),
            Err(err) => {
                tracing::warn!(name, error = %err, "update rejected, keeping current program");
                Err(err)
            }
        }
    }

    /// Publish an already compiled program. Returns its version.
    pub fn publish(&self, program: CompiledProgram) -> u64 {
        let mut published = self.program.write().unwrap_or_else(PoisonError::into_inner);
        published.next_version += 1;
        let version = published.next_version;
        published.current = Some(Arc::new(program.with_version(version)));
        drop(published);

        tracing::debug!(version, "published program");
        version
    }

    fn current(&self) -> Option<Arc<CompiledProgram>> {
        self.program
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Version of the current program, if one has been published.
    pub fn current_version(&self) -> Option<u64> {
        self.current().map(|p| p.version())
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.executor.pool().stats()
    }

    /// Dispose every instance. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        if self.executor.close() {
            tracing::info!("engine closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }
}
