//! Builder contract
//!
//! A module-level builder is one pluggable stage of the compilation pipeline.
//! It is handed a chunk of modules and reports back through the context.

use droid_dex_core::ModuleChunk;

use crate::{BuildError, CompileContext};

/// Outcome of running a builder over a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Nothing to do for this chunk
    NothingDone,
    /// Finished without errors
    Ok,
    /// Errors were reported; later stages should not run
    Abort,
}

impl ExitCode {
    pub fn is_abort(&self) -> bool {
        matches!(self, ExitCode::Abort)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitCode::NothingDone => "nothing done",
            ExitCode::Ok => "ok",
            ExitCode::Abort => "abort",
        }
    }
}

/// Where in the pipeline a builder runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuilderCategory {
    SourceGenerator,
    Translator,
    ClassPostProcessor,
}

/// A stage that runs once per module chunk
#[allow(async_fn_in_trait)]
pub trait ModuleLevelBuilder {
    /// Short id used as the source of reported messages
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn category(&self) -> BuilderCategory;

    async fn build(
        &self,
        context: &CompileContext,
        chunk: &ModuleChunk,
    ) -> Result<ExitCode, BuildError>;
}
