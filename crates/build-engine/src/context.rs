//! Compile context handed to builders

use std::sync::Arc;
use tracing::debug;

use droid_dex_core::{
    BuildMessage, CompilerMessage, MessageKind, MessageSink, ProjectModel, ProjectPaths,
};

/// Everything a builder may look at or report to during one build
pub struct CompileContext {
    paths: ProjectPaths,
    sink: Arc<dyn MessageSink>,
    compiling_tests: bool,
}

impl CompileContext {
    pub fn new(project: Arc<ProjectModel>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            paths: ProjectPaths::new(project),
            sink,
            compiling_tests: false,
        }
    }

    /// Build test sources instead of production sources
    pub fn with_tests(mut self, compiling_tests: bool) -> Self {
        self.compiling_tests = compiling_tests;
        self
    }

    pub fn project(&self) -> &ProjectModel {
        self.paths.project()
    }

    pub fn project_paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn is_compiling_tests(&self) -> bool {
        self.compiling_tests
    }

    pub fn process_message(&self, message: impl Into<BuildMessage>) {
        let message = message.into();
        debug!("{:?}", message);
        self.sink.process_message(message);
    }

    /// Shorthand for a compiler message from `builder`
    pub fn report(&self, builder: &str, kind: MessageKind, text: impl Into<String>) {
        self.process_message(CompilerMessage::new(builder, kind, text));
    }
}
