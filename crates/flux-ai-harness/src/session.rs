use std::sync::Arc;

use crate::harness::HarnessInner;
use crate::model::ModelRef;
use crate::run::RunBuilder;
use crate::tools::ToolRegistry;

/// Configuration used to create a `Session`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Human-readable session name (useful for logs).
    pub name: String,
    /// Tools offered to the model on every run of this session.
    pub tools: Arc<ToolRegistry>,
}

impl SessionConfig {
    /// Creates a named session config with no tools.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Arc::new(ToolRegistry::new()),
        }
    }

    /// Attaches the tools offered to the model.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }
}

/// Logical grouping for runs.
///
/// Sessions are in-memory only. Callers replay earlier turns through
/// [`RunBuilder::history`].
#[derive(Clone)]
pub struct Session {
    pub(crate) harness: Arc<HarnessInner>,
    pub(crate) session_id: uuid::Uuid,
    pub(crate) config: SessionConfig,
}

impl Session {
    pub(crate) fn new(harness: Arc<HarnessInner>, config: SessionConfig) -> Self {
        Self {
            harness,
            session_id: uuid::Uuid::new_v4(),
            config,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Starts building a run for the given model.
    pub fn run(&self, model: ModelRef) -> RunBuilder {
        RunBuilder::new(
            self.harness.clone(),
            self.session_id,
            self.config.name.clone(),
            self.config.tools.clone(),
            model,
        )
    }
}
