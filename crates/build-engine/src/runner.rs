//! Build Runner
//!
//! Drives a module-level builder over every chunk of a project, in
//! dependency order, and sums up what happened.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use droid_dex_core::{BuildMessage, MessageKind, MessageSink, ProjectModel};

use crate::{BuildError, CompileContext, ExitCode, ModuleLevelBuilder};

/// Result of a whole build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    /// Chunks the builder ran on
    pub chunks_built: usize,
    /// Chunks in the project
    pub chunks_total: usize,
    pub exit_code: ExitCode,
    pub errors: usize,
    pub warnings: usize,
    pub duration_secs: f64,
}

impl BuildSummary {
    pub fn success(&self) -> bool {
        !self.exit_code.is_abort()
    }
}

/// Forwards messages while counting diagnostics
struct CountingSink {
    inner: Arc<dyn MessageSink>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl MessageSink for CountingSink {
    fn process_message(&self, message: BuildMessage) {
        if let Some(msg) = message.as_compiler() {
            match msg.kind {
                MessageKind::Error => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                }
                MessageKind::Warning => {
                    self.warnings.fetch_add(1, Ordering::Relaxed);
                }
                MessageKind::Info => {}
            }
        }
        self.inner.process_message(message);
    }
}

/// Runs one builder over a project
pub struct BuildRunner<B: ModuleLevelBuilder> {
    builder: B,
    compiling_tests: bool,
}

impl<B: ModuleLevelBuilder> BuildRunner<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            compiling_tests: false,
        }
    }

    /// Build test outputs instead of production outputs
    pub fn with_tests(mut self, compiling_tests: bool) -> Self {
        self.compiling_tests = compiling_tests;
        self
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Run the builder chunk by chunk; stops at the first abort or error
    pub async fn run(
        &self,
        project: Arc<ProjectModel>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();
        let chunks = project.chunks()?;
        info!(
            "Starting {} for project '{}' ({} chunks)",
            self.builder.name(),
            project.name,
            chunks.len()
        );

        let counter = Arc::new(CountingSink {
            inner: sink,
            errors: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
        });
        let context =
            CompileContext::new(project, counter.clone()).with_tests(self.compiling_tests);

        let mut exit_code = ExitCode::NothingDone;
        let mut chunks_built = 0;

        for chunk in &chunks {
            chunks_built += 1;
            match self.builder.build(&context, chunk).await {
                Ok(ExitCode::Abort) => {
                    error!(
                        "{} aborted on chunk [{}]",
                        self.builder.name(),
                        chunk.presentable_name()
                    );
                    exit_code = ExitCode::Abort;
                    break;
                }
                Ok(ExitCode::Ok) => exit_code = ExitCode::Ok,
                Ok(ExitCode::NothingDone) => {}
                Err(err) => {
                    error!(
                        "{} failed on chunk [{}]: {}",
                        self.builder.name(),
                        chunk.presentable_name(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        let summary = BuildSummary {
            chunks_built,
            chunks_total: chunks.len(),
            exit_code,
            errors: counter.errors.load(Ordering::Relaxed),
            warnings: counter.warnings.load(Ordering::Relaxed),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            "{} finished: {} in {:.2}s ({} errors, {} warnings)",
            self.builder.name(),
            summary.exit_code.as_str(),
            summary.duration_secs,
            summary.errors,
            summary.warnings
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use droid_dex_core::{
        BuildMessage, CollectingSink, Module, ModuleChunk, ModuleDependency, DependencyScope,
    };
    use crate::BuilderCategory;

    /// Aborts on one named module, records the chunks it saw
    struct ScriptedBuilder {
        abort_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    impl ModuleLevelBuilder for ScriptedBuilder {
        fn name(&self) -> &str {
            "scripted"
        }

        fn description(&self) -> &str {
            "Scripted test builder"
        }

        fn category(&self) -> BuilderCategory {
            BuilderCategory::ClassPostProcessor
        }

        async fn build(&self, context: &CompileContext, chunk: &ModuleChunk) -> Result<ExitCode, BuildError> {
            self.seen.lock().push(chunk.presentable_name());
            if self.abort_on.map(|m| chunk.contains(m)).unwrap_or(false) {
                context.report("scripted", MessageKind::Error, "failed");
                return Ok(ExitCode::Abort);
            }
            context.report("scripted", MessageKind::Warning, "meh");
            context.process_message(BuildMessage::progress("working"));
            Ok(ExitCode::Ok)
        }
    }

    fn project() -> Arc<ProjectModel> {
        let dep = |name: &str| ModuleDependency { module: name.into(), scope: DependencyScope::Compile };
        let mut app = Module::new("app");
        app.dependencies.push(dep("lib"));
        let mut lib = Module::new("lib");
        lib.dependencies.push(dep("util"));
        Arc::new(ProjectModel {
            name: "demo".into(),
            modules: vec![app, lib, Module::new("util")],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_runs_chunks_in_dependency_order() {
        let runner = BuildRunner::new(ScriptedBuilder { abort_on: None, seen: Mutex::new(Vec::new()) });
        let sink = Arc::new(CollectingSink::new());

        let summary = runner.run(project(), sink.clone()).await.unwrap();

        assert_eq!(*runner.builder().seen.lock(), vec!["util", "lib", "app"]);
        assert_eq!(summary.exit_code, ExitCode::Ok);
        assert_eq!(summary.chunks_built, 3);
        assert_eq!(summary.warnings, 3);
        assert_eq!(summary.errors, 0);
        assert!(summary.success());
        assert_eq!(sink.messages().len(), 6);
    }

    #[tokio::test]
    async fn test_abort_stops_later_chunks() {
        let runner = BuildRunner::new(ScriptedBuilder { abort_on: Some("lib"), seen: Mutex::new(Vec::new()) });
        let sink = Arc::new(CollectingSink::new());

        let summary = runner.run(project(), sink).await.unwrap();

        assert_eq!(*runner.builder().seen.lock(), vec!["util", "lib"]);
        assert_eq!(summary.exit_code, ExitCode::Abort);
        assert_eq!(summary.chunks_built, 2);
        assert_eq!(summary.chunks_total, 3);
        assert_eq!(summary.errors, 1);
        assert!(!summary.success());
    }
}
