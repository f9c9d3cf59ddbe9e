//! Single-call orchestration.
//!
//! Check out an instance, bind the call, run the program, translate the
//! outcome, and check the instance back in whatever happened.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rhai::EvalAltResult;

use crate::capability;
use crate::compile::CompiledProgram;
use crate::error::{CapabilityError, Error, Result};
use crate::value::Value;

use super::context::CallContext;
use super::pool::InstancePool;

/// Runs compiled programs on pooled instances.
pub struct Executor {
    pool: InstancePool,
}

impl Executor {
    pub fn new(pool: InstancePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    /// Run `program` once under `ctx`.
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close) without touching
    /// the pool, and [`Error::Timeout`] without running anything if the
    /// context is already done.
    pub fn execute(&self, ctx: &CallContext, program: &CompiledProgram) -> Result<Value> {
        if self.pool.is_closed() {
            return Err(Error::Closed);
        }
        if ctx.is_done() {
            return Err(Error::Timeout);
        }

        let mut lease = self.pool.acquire()?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            lease.reset();
            lease.bind(ctx);
            let result = lease.run(program);
            lease.unbind();
            result
        }));

        match outcome {
            Ok(Ok(value)) => Ok(Value::from(value)),
            Ok(Err(err)) => Err(translate(*err)),
            Err(payload) => {
                lease.discard();
                let message = panic_message(payload.as_ref());
                tracing::warn!(program = program.name(), %message, "script call panicked");
                Err(Error::execution(format!("panic during execution: {message}")))
            }
        }
    }

    /// Close the pool. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.pool.close_all()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn translate(err: EvalAltResult) -> Error {
    if matches!(err, EvalAltResult::ErrorTerminated(..)) {
        return Error::Timeout;
    }
    match capability::raised(&err) {
        Some(CapabilityError::Cancelled) => Error::Timeout,
        Some(cause) => Error::Execution {
            message: cause.to_string(),
            cause: Some(cause),
        },
        None => Error::execution(err.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::compile::Compiler;
    use crate::config::EngineConfig;
    use crate::fetch::DefaultFetcher;
    use crate::model::PmmlParser;

    fn fixture() -> (Executor, Compiler) {
        let config = EngineConfig::default();
        let registry = Arc::new(CapabilityRegistry::new(
            &config,
            Arc::new(DefaultFetcher::new()),
            Arc::new(PmmlParser::default()),
        ));
        let compiler = Compiler::new(&config, &registry);
        (Executor::new(InstancePool::new(config, registry)), compiler)
    }

    #[test]
    fn test_success() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str("#{ a: 1, b: [true, 2.5] }", "t").unwrap();
        let value = executor.execute(&CallContext::background(), &program).unwrap();

        let Value::Table(table) = value else {
            panic!("expected a table");
        };
        assert_eq!(table["a"], Value::Integer(1));
        assert_eq!(
            table["b"],
            Value::Array(vec![Value::Bool(true), Value::Number(2.5)])
        );
    }

    #[test]
    fn test_instance_released_on_every_path() {
        let (executor, compiler) = fixture();
        let ok = compiler.compile_str("1", "ok").unwrap();
        let bad = compiler.compile_str(r#"throw "boom""#, "bad").unwrap();

        executor.execute(&CallContext::background(), &ok).unwrap();
        executor.execute(&CallContext::background(), &bad).unwrap_err();
        let expired = CallContext::with_timeout(Duration::from_millis(20));
        let spin = compiler.compile_str("loop {}", "spin").unwrap();
        executor.execute(&expired, &spin).unwrap_err();

        let stats = executor.pool().stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.available, 1);
    }

    #[test]
    fn test_script_error_is_execution_error() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str(r#"throw "boom""#, "t").unwrap();
        let err = executor
            .execute(&CallContext::background(), &program)
            .unwrap_err();
        match err {
            Error::Execution { message, cause } => {
                assert!(message.contains("boom"), "{message}");
                assert!(cause.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_capability_error_carries_cause() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str("capability::hash(1)", "t").unwrap();
        let err = executor
            .execute(&CallContext::background(), &program)
            .unwrap_err();
        assert!(matches!(err.capability(), Some(CapabilityError::Argument(_))));
    }

    #[test]
    fn test_deadline_terminates_loop() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str("loop {}", "t").unwrap();
        let start = Instant::now();
        let err = executor
            .execute(&CallContext::with_timeout(Duration::from_millis(50)), &program)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_expired_deadline_skips_pool() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str("1", "t").unwrap();
        let ctx = CallContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(executor.execute(&ctx, &program), Err(Error::Timeout)));
        assert_eq!(executor.pool().stats().created, 0);
    }

    #[test]
    fn test_state_cleared_between_calls() {
        let (executor, compiler) = fixture();
        let define = compiler.compile_str("let seen = 1; seen", "t").unwrap();
        let lookup = compiler.compile_str("seen", "t").unwrap();

        executor.execute(&CallContext::background(), &define).unwrap();
        let err = executor
            .execute(&CallContext::background(), &lookup)
            .unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[test]
    fn test_closed() {
        let (executor, compiler) = fixture();
        let program = compiler.compile_str("1", "t").unwrap();
        assert!(executor.close());
        assert!(!executor.close());
        assert!(matches!(
            executor.execute(&CallContext::background(), &program),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
