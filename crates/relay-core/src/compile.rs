//! Script compilation.
//!
//! Source text is parsed once into an immutable [`CompiledProgram`] that any
//! number of instances can run concurrently.

use std::io::Read;
use std::sync::Arc;

use rhai::AST;

use crate::capability::{CapabilityRegistry, MODULE_NAME};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::execute::{CallBinding, build_interpreter};

/// A parsed program, shared by reference between in-flight calls.
///
/// Never mutated after construction. The engine stamps a version on it when
/// it is published.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    name: String,
    version: u64,
    ast: Arc<AST>,
}

impl CompiledProgram {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publication version; 0 until the program is published.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Turns source text into [`CompiledProgram`]s.
pub struct Compiler {
    engine: rhai::Engine,
}

impl Compiler {
    /// A compiler whose interpreter matches the instances built from `config`.
    pub fn new(config: &EngineConfig, capabilities: &Arc<CapabilityRegistry>) -> Self {
        let mut engine = build_interpreter(config);
        let detached = Arc::new(CallBinding::new());
        engine.register_static_module(MODULE_NAME, capabilities.module(detached).into());
        Self { engine }
    }

    /// Read `source` to the end and compile it.
    ///
    /// Unreadable or non-UTF-8 input is reported as a compile error, as is
    /// any syntax error. Nothing usable is returned on failure.
    pub fn compile(&self, mut source: impl Read, name: &str) -> Result<CompiledProgram> {
        let mut text = String::new();
        source
            .read_to_string(&mut text)
            .map_err(|e| Error::Compile {
                name: name.to_string(),
                message: format!("cannot read source: {e}"),
                line: None,
            })?;
        self.compile_str(&text, name)
    }

    pub fn compile_str(&self, source: &str, name: &str) -> Result<CompiledProgram> {
        let ast = self.engine.compile(source).map_err(|e| Error::Compile {
            name: name.to_string(),
            message: e.to_string(),
            line: e.position().line(),
        })?;

        Ok(CompiledProgram {
            name: name.to_string(),
            version: 0,
            ast: Arc::new(ast),
        })
    }
}
