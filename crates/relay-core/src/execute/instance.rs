//! A reusable interpreter instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rhai::{Dynamic, EvalAltResult, Scope};

use crate::capability::{CapabilityRegistry, MODULE_NAME};
use crate::compile::CompiledProgram;
use crate::config::EngineConfig;

use super::context::{CallBinding, CallContext};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Build an interpreter with the configured limits and script output routed
/// to `tracing`.
///
/// Used for both instance engines and the compiler so a program compiled by
/// one behaves the same in the other.
pub(crate) fn build_interpreter(config: &EngineConfig) -> rhai::Engine {
    let mut engine = rhai::Engine::new();

    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_operations(config.max_operations);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);

    engine.on_print(|text| tracing::info!(target: "relay::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: "relay::script", source, %pos, "{text}");
    });

    engine
}

/// One interpreter engine plus its global namespace.
///
/// The capability module is registered once at construction. The call
/// binding is the only thing that changes between calls.
pub struct ExecutionInstance {
    id: u64,
    engine: rhai::Engine,
    scope: Scope<'static>,
    binding: Arc<CallBinding>,
}

impl ExecutionInstance {
    pub(crate) fn new(config: &EngineConfig, capabilities: &Arc<CapabilityRegistry>) -> Self {
        let binding = Arc::new(CallBinding::new());
        let mut engine = build_interpreter(config);

        // Every operation is a cancellation checkpoint.
        let progress = Arc::clone(&binding);
        engine.on_progress(move |_| progress.is_done().then_some(Dynamic::UNIT));

        let module = capabilities.module(Arc::clone(&binding));
        engine.register_static_module(MODULE_NAME, module.into());

        Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            engine,
            scope: Scope::new(),
            binding,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Drop variables and constants left behind by a previous call.
    pub(crate) fn reset(&mut self) {
        self.scope.clear();
        self.binding.clear();
    }

    /// Attach `ctx` for the duration of one call and expose its inputs.
    pub(crate) fn bind(&mut self, ctx: &CallContext) {
        self.binding.bind(ctx);
        for (name, value) in ctx.inputs() {
            self.scope
                .push_constant_dynamic(name.as_str(), value.to_dynamic());
        }
    }

    pub(crate) fn unbind(&mut self) {
        self.binding.clear();
    }

    /// Evaluate `program` against this instance's namespace.
    ///
    /// The AST is shared, not copied or reparsed.
    pub(crate) fn run(&mut self, program: &CompiledProgram) -> Result<Dynamic, Box<EvalAltResult>> {
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, program.ast())
    }

    #[cfg(test)]
    pub(crate) fn scope_len(&self) -> usize {
        self.scope.len()
    }
}

impl std::fmt::Debug for ExecutionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionInstance")
            .field("id", &self.id)
            .field("variables", &self.scope.len())
            .finish()
    }
}
