//! Host capabilities exposed to scripts.
//!
//! Every instance gets the same `capability` module at construction:
//!
//! | Script name                               | Result                         |
//! |-------------------------------------------|--------------------------------|
//! | `capability::hash(text)`                  | 64-bit MurmurHash3 of `text`   |
//! | `capability::evaluate(locator, features)` | decision-tree score (float)    |
//! | `capability::version`                     | constant version string        |
//!
//! Failures are raised into the script as [`CapabilityError`] values and
//! surface to the host as [`Error::Execution`](crate::Error::Execution).

mod hash;

use std::sync::Arc;
use std::time::Duration;

use rhai::{Dynamic, EvalAltResult, FLOAT, INT, Map, Module, Position};

use crate::cache::ResourceCache;
use crate::config::EngineConfig;
use crate::error::CapabilityError;
use crate::execute::CallBinding;
use crate::fetch::Fetcher;
use crate::model::{ModelParser, TreeModel};
use crate::value::coerce_features;

pub use hash::hash64;

/// Name of the module scripts use to reach the capabilities.
pub const MODULE_NAME: &str = "capability";

type CapabilityResult<T> = Result<T, Box<EvalAltResult>>;

fn raise(err: CapabilityError) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(Dynamic::from(err), Position::NONE).into()
}

fn argument<T>(message: &str) -> CapabilityResult<T> {
    Err(raise(CapabilityError::Argument(message.to_string())))
}

/// Find the capability failure behind an interpreter error, looking through
/// function-call and module wrappers.
pub(crate) fn raised(err: &EvalAltResult) -> Option<CapabilityError> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<CapabilityError>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => raised(inner),
        _ => None,
    }
}

/// The fixed capability set shared by all instances of an engine.
pub struct CapabilityRegistry {
    models: ResourceCache<Arc<TreeModel>>,
    parser: Arc<dyn ModelParser>,
    fetch_timeout: Duration,
    version: String,
}

impl CapabilityRegistry {
    pub fn new(
        config: &EngineConfig,
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn ModelParser>,
    ) -> Self {
        Self {
            models: ResourceCache::new(config.cache_capacity, fetcher),
            parser,
            fetch_timeout: config.fetch_timeout,
            version: config.version.clone(),
        }
    }

    /// Parsed models currently cached.
    pub fn models(&self) -> &ResourceCache<Arc<TreeModel>> {
        &self.models
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the `capability` module for one instance.
    ///
    /// `binding` is the instance's call slot; `evaluate` reads the current
    /// call's context from it so fetches honour the caller's deadline.
    pub(crate) fn module(self: &Arc<Self>, binding: Arc<CallBinding>) -> Module {
        let mut module = Module::new();
        module.set_var("version", self.version.clone());

        module.set_native_fn("hash", |value: Dynamic| -> CapabilityResult<INT> {
            match value.into_immutable_string() {
                Ok(text) => Ok(hash64(text.as_bytes()) as INT),
                Err(_) => argument("hash expects a string argument"),
            }
        });
        module.set_native_fn("hash", || -> CapabilityResult<INT> {
            argument("hash expects a string argument")
        });

        let registry = Arc::clone(self);
        module.set_native_fn(
            "evaluate",
            move |locator: Dynamic, features: Dynamic| -> CapabilityResult<FLOAT> {
                registry.evaluate(&binding, locator, features)
            },
        );
        module.set_native_fn("evaluate", || -> CapabilityResult<FLOAT> {
            argument("evaluate expects 2 arguments, got 0")
        });
        module.set_native_fn("evaluate", |_: Dynamic| -> CapabilityResult<FLOAT> {
            argument("evaluate expects 2 arguments, got 1")
        });
        module.set_native_fn(
            "evaluate",
            |_: Dynamic, _: Dynamic, _: Dynamic| -> CapabilityResult<FLOAT> {
                argument("evaluate expects 2 arguments, got 3")
            },
        );

        module
    }

    fn evaluate(
        &self,
        binding: &CallBinding,
        locator: Dynamic,
        features: Dynamic,
    ) -> CapabilityResult<FLOAT> {
        let Ok(locator) = locator.into_immutable_string() else {
            return argument("evaluate expects a string locator");
        };
        let Some(features) = features.try_cast::<Map>() else {
            return argument("evaluate expects a map of features");
        };

        let ctx = binding.context();
        let parser = Arc::clone(&self.parser);
        let model = self
            .models
            .get_or_load(
                &locator,
                |bytes| parser.parse(bytes).map(Arc::new).map_err(|e| e.to_string()),
                &ctx,
                self.fetch_timeout,
            )
            .map_err(raise)?;

        model
            .score(&coerce_features(&features))
            .map_err(|e| raise(CapabilityError::Evaluation(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::CallContext;
    use crate::fetch::FetchError;
    use crate::model::PmmlParser;

    struct StaticFetcher(&'static str);

    impl Fetcher for StaticFetcher {
        fn fetch(&self, _locator: &str, _ctx: &CallContext) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    const STUMP: &str = r#"<Node id="0"><True/>
        <Node id="1" score="3.5"><SimplePredicate field="x" operator="lessThan" value="0"/></Node>
        <Node id="2" score="7"><True/></Node>
    </Node>"#;

    fn engine_with(registry: CapabilityRegistry) -> (rhai::Engine, Arc<CallBinding>) {
        let registry = Arc::new(registry);
        let binding = Arc::new(CallBinding::new());
        let mut engine = rhai::Engine::new();
        engine.register_static_module(MODULE_NAME, registry.module(binding.clone()).into());
        (engine, binding)
    }

    fn registry(body: &'static str) -> CapabilityRegistry {
        CapabilityRegistry::new(
            &EngineConfig::default(),
            Arc::new(StaticFetcher(body)),
            Arc::new(PmmlParser::default()),
        )
    }

    fn capability_error(err: Box<EvalAltResult>) -> CapabilityError {
        raised(&err).unwrap_or_else(|| panic!("unexpected error: {err:?}"))
    }

    #[test]
    fn test_hash() {
        let (engine, _) = engine_with(registry(STUMP));
        let value: INT = engine.eval(r#"capability::hash("a")"#).unwrap();
        assert_eq!(value as u64, hash64(b"a"));
    }

    #[test]
    fn test_hash_argument_errors() {
        let (engine, _) = engine_with(registry(STUMP));
        for script in ["capability::hash(5)", "capability::hash()"] {
            let err = engine.eval::<INT>(script).unwrap_err();
            assert!(matches!(capability_error(err), CapabilityError::Argument(_)));
        }
    }

    #[test]
    fn test_version() {
        let (engine, _) = engine_with(registry(STUMP));
        let version: String = engine.eval("capability::version").unwrap();
        assert_eq!(version, "1.0.0");
    }

    #[test]
    fn test_evaluate() {
        let (engine, _) = engine_with(registry(STUMP));
        let low: FLOAT = engine
            .eval(r#"capability::evaluate("m", #{ x: -1 })"#)
            .unwrap();
        let high: FLOAT = engine
            .eval(r#"capability::evaluate("m", #{ x: 2.5 })"#)
            .unwrap();
        assert_eq!(low, 3.5);
        assert_eq!(high, 7.0);
    }

    #[test]
    fn test_evaluate_argument_errors() {
        let (engine, _) = engine_with(registry(STUMP));
        for script in [
            r#"capability::evaluate("m")"#,
            r#"capability::evaluate(1, #{})"#,
            r#"capability::evaluate("m", [1, 2])"#,
            r#"capability::evaluate("m", #{}, 3)"#,
        ] {
            let err = engine.eval::<FLOAT>(script).unwrap_err();
            assert!(
                matches!(capability_error(err), CapabilityError::Argument(_)),
                "{script}"
            );
        }
    }

    #[test]
    fn test_evaluate_parse_error() {
        let (engine, _) = engine_with(registry("not a model"));
        let err = engine
            .eval::<FLOAT>(r#"capability::evaluate("m", #{ x: 1 })"#)
            .unwrap_err();
        assert!(matches!(capability_error(err), CapabilityError::Parse { .. }));
    }

    #[test]
    fn test_evaluate_missing_feature() {
        let (engine, _) = engine_with(registry(STUMP));
        let err = engine
            .eval::<FLOAT>(r#"capability::evaluate("m", #{ y: 1 })"#)
            .unwrap_err();
        assert!(matches!(capability_error(err), CapabilityError::Evaluation(_)));
    }

    #[test]
    fn test_evaluate_cancelled_call() {
        let (engine, binding) = engine_with(registry(STUMP));
        let ctx = CallContext::background();
        ctx.cancel();
        binding.bind(&ctx);

        let err = engine
            .eval::<FLOAT>(r#"capability::evaluate("m", #{ x: 1 })"#)
            .unwrap_err();
        assert_eq!(capability_error(err), CapabilityError::Cancelled);
    }
}
