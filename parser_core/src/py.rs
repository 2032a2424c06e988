//! Python bindings using PyO3
//!
//! Each wrapper owns a current-thread tokio runtime and blocks on the async
//! parsers. Results cross the boundary as JSON strings.

use std::collections::HashMap;
use std::sync::Arc;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

use crate::chain::ChainParser;
use crate::config::EngineConfig;
use crate::conversation::ConversationEngine;
use crate::entities::EntityExtractor;
use crate::error::Error;
use crate::matcher::IntentParser;
use crate::resolver::{EntityResolver, StaticResolver};
use crate::schedule::SystemClock;

fn runtime() -> PyResult<Runtime> {
    Builder::new_current_thread()
        .build()
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to start runtime: {}", e)))
}

fn resolver(
    domains: Option<HashMap<String, String>>,
    aliases: Option<HashMap<String, String>>,
) -> Arc<dyn EntityResolver> {
    let mut resolver = StaticResolver::default();
    for (domain, address) in domains.unwrap_or_default() {
        resolver = resolver.with_domain(domain, address);
    }
    for (alias, address) in aliases.unwrap_or_default() {
        resolver = resolver.with_alias(alias, address);
    }
    Arc::new(resolver)
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value)
        .map_err(|e| PyValueError::new_err(format!("Failed to serialize result: {}", e)))
}

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Config(msg) => PyValueError::new_err(msg),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Single-command parser
#[pyclass]
pub struct PyIntentParser {
    parser: IntentParser,
    runtime: Runtime,
}

#[pymethods]
impl PyIntentParser {
    #[new]
    #[pyo3(signature = (domains=None, aliases=None))]
    fn new(
        domains: Option<HashMap<String, String>>,
        aliases: Option<HashMap<String, String>>,
    ) -> PyResult<Self> {
        Ok(Self {
            parser: IntentParser::new(resolver(domains, aliases)),
            runtime: runtime()?,
        })
    }

    /// Parse one command; returns the result as JSON
    fn parse(&self, input: &str) -> PyResult<String> {
        let result = self
            .runtime
            .block_on(self.parser.parse(input))
            .map_err(to_py_err)?;
        to_json(&result)
    }
}

/// Chain, schedule and condition parser
#[pyclass]
pub struct PyChainParser {
    parser: ChainParser,
    runtime: Runtime,
}

#[pymethods]
impl PyChainParser {
    #[new]
    #[pyo3(signature = (domains=None, aliases=None))]
    fn new(
        domains: Option<HashMap<String, String>>,
        aliases: Option<HashMap<String, String>>,
    ) -> PyResult<Self> {
        Ok(Self {
            parser: ChainParser::new(resolver(domains, aliases), Arc::new(SystemClock)),
            runtime: runtime()?,
        })
    }

    fn parse(&self, input: &str) -> PyResult<String> {
        let result = self
            .runtime
            .block_on(self.parser.parse(input))
            .map_err(to_py_err)?;
        to_json(&result)
    }
}

/// One conversation session
#[pyclass]
pub struct PyConversation {
    engine: ConversationEngine,
    runtime: Runtime,
}

#[pymethods]
impl PyConversation {
    #[new]
    #[pyo3(signature = (domains=None, aliases=None, config_path=None))]
    fn new(
        domains: Option<HashMap<String, String>>,
        aliases: Option<HashMap<String, String>>,
        config_path: Option<String>,
    ) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::from_json_file(path),
            None => EngineConfig::from_env(),
        }
        .map_err(to_py_err)?;

        Ok(Self {
            engine: ConversationEngine::new(
                resolver(domains, aliases),
                Arc::new(SystemClock),
                config,
            ),
            runtime: runtime()?,
        })
    }

    /// Process one turn; returns the outcome as JSON
    fn process(&mut self, input: &str) -> PyResult<String> {
        let outcome = self
            .runtime
            .block_on(self.engine.process(input))
            .map_err(to_py_err)?;
        to_json(&outcome)
    }

    fn context(&self) -> PyResult<String> {
        to_json(self.engine.context())
    }

    fn suggestions(&self) -> Vec<String> {
        self.engine.suggestions()
    }

    fn can_undo(&self) -> bool {
        self.engine.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.engine.can_redo()
    }
}

/// Python wrapper for entity extractor
#[pyclass]
pub struct PyEntityExtractor {
    extractor: EntityExtractor,
}

#[pymethods]
impl PyEntityExtractor {
    #[new]
    fn new() -> Self {
        Self {
            extractor: EntityExtractor::new(),
        }
    }

    fn extract<'py>(&self, text: &str, py: Python<'py>) -> PyResult<Vec<Bound<'py, PyDict>>> {
        self.extractor
            .extract(text)
            .iter()
            .map(|e| -> PyResult<Bound<'py, PyDict>> {
                let dict = PyDict::new_bound(py);
                dict.set_item("kind", to_json(&e.kind)?.trim_matches('"'))?;
                dict.set_item("value", &e.value)?;
                dict.set_item("original", &e.original)?;
                dict.set_item("start", e.start)?;
                dict.set_item("end", e.end)?;
                Ok(dict)
            })
            .collect()
    }
}
