//! Dex Builder
//!
//! Converts the compiled classes of every Android application module in a
//! chunk into a `classes.dex` by running dx through a small Java runner.
//! Modules are handled one after another; a failing module marks the step
//! as aborted but never stops the loop. Every run recomputes its inputs from
//! scratch.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use droid_dex_core::{
    BuildMessage, CompilerMessage, CoreError, MessageKind, Module, ModuleChunk, ProjectModel,
    ProjectPaths,
};
use droid_dex_toolchain::{dx_jar_path, parse_android_target, AndroidSdk};

use crate::config::{DexSettings, DX_MAX_HEAP};
use crate::dx_output::classify_output;
use crate::process::{build_java_command_line, TokioProcessRunner, ToolRunner};
use crate::{BuildError, BuilderCategory, CompileContext, ExitCode, ModuleLevelBuilder};

pub const BUILDER_NAME: &str = "android-dex";

/// File dx writes into the packaged output directory
pub const CLASSES_FILE_NAME: &str = "classes.dex";

const EXCLUDE_FLAG: &str = "--exclude";

/// The dex step
pub struct DexBuilder<R: ToolRunner = TokioProcessRunner> {
    settings: DexSettings,
    runner: R,
}

impl DexBuilder<TokioProcessRunner> {
    pub fn new(settings: DexSettings) -> Self {
        Self::with_runner(settings, TokioProcessRunner)
    }
}

impl<R: ToolRunner> DexBuilder<R> {
    /// Use a custom process runner
    pub fn with_runner(settings: DexSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &DexSettings {
        &self.settings
    }

    async fn do_build(
        &self,
        context: &CompileContext,
        chunk: &ModuleChunk,
    ) -> Result<ExitCode, BuildError> {
        let mut success = true;

        for module in context.project().chunk_modules(chunk)? {
            if !module.has_android_facet() || module.is_android_library() {
                continue;
            }
            if !self.dex_module(context, module).await? {
                success = false;
            }
        }

        Ok(if success { ExitCode::Ok } else { ExitCode::Abort })
    }

    /// Returns false when the module failed; the reason has been reported
    async fn dex_module(
        &self,
        context: &CompileContext,
        module: &Module,
    ) -> Result<bool, BuildError> {
        let error = |text: String| {
            context.process_message(
                CompilerMessage::new(BUILDER_NAME, MessageKind::Error, text)
                    .with_module(&module.name),
            );
        };

        let Some(sdk) = resolve_sdk(context.project(), module) else {
            error(format!("Android SDK is not specified for module {}", module.name));
            return Ok(false);
        };

        if let Err(err) = parse_android_target(&sdk) {
            error(format!(
                "Android SDK is invalid or not specified for module {}: {}",
                module.name, err
            ));
            return Ok(false);
        }

        let paths = context.project_paths();
        let Some(output_dir) = paths.packaged_output_dir(module) else {
            error(format!("Output directory is not specified for module {}", module.name));
            return Ok(false);
        };

        let classes_dir = match paths.module_output_dir(module, false) {
            Some(dir) if dir.is_dir() => dir,
            _ => {
                context.process_message(
                    CompilerMessage::new(
                        BUILDER_NAME,
                        MessageKind::Info,
                        format!(
                            "Dex won't be launched for module {} because it doesn't contain compiled files",
                            module.name
                        ),
                    )
                    .with_module(&module.name),
                );
                return Ok(true);
            }
        };

        let inputs = collect_inputs(paths, module, &classes_dir)?;
        debug!("Dex inputs for {}: {:?}", module.name, inputs);

        self.run_dex(context, module, &sdk, &output_dir, inputs).await
    }

    async fn run_dex(
        &self,
        context: &CompileContext,
        module: &Module,
        sdk: &AndroidSdk,
        output_dir: &Path,
        inputs: BTreeSet<PathBuf>,
    ) -> Result<bool, BuildError> {
        let report = |kind: MessageKind, text: String| {
            context.process_message(
                CompilerMessage::new(BUILDER_NAME, kind, text).with_module(&module.name),
            );
        };

        let dx_jar = dx_jar_path(sdk, self.settings.dx_jar.as_deref());
        if !dx_jar.is_file() {
            report(MessageKind::Error, format!("Cannot find file {}", dx_jar.display()));
            return Ok(false);
        }

        let out_file = output_dir.join(CLASSES_FILE_NAME);

        let mut params: Vec<OsString> =
            vec![dx_jar.into_os_string(), out_file.clone().into_os_string()];
        params.extend(inputs.into_iter().map(PathBuf::into_os_string));
        params.push(EXCLUDE_FLAG.into());

        let java = sdk.java_executable(self.settings.jdk_home.as_deref());
        let command = build_java_command_line(
            &java,
            &self.settings.runner_class,
            &[DX_MAX_HEAP],
            &self.settings.runner_classpath,
            params,
        )?;

        if out_file.exists() {
            if let Err(err) = tokio::fs::remove_file(&out_file).await {
                warn!("Cannot delete {:?}: {}", out_file, err);
                report(MessageKind::Warning, format!("Cannot delete file {}", out_file.display()));
            }
        }
        if let Err(err) = tokio::fs::create_dir_all(output_dir).await {
            report(
                MessageKind::Error,
                format!("Cannot create directory {}: {}", output_dir.display(), err),
            );
            return Ok(false);
        }

        info!("{}", command.to_command_string());

        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(err) => {
                report(MessageKind::Error, format!("Cannot run dx: {}", err));
                return Ok(false);
            }
        };

        let messages = classify_output(&output, &out_file);
        let success = !messages.has_errors();
        for message in messages.into_compiler_messages(BUILDER_NAME, &module.name) {
            context.process_message(message);
        }

        Ok(success)
    }
}

impl<R: ToolRunner> ModuleLevelBuilder for DexBuilder<R> {
    fn name(&self) -> &str {
        BUILDER_NAME
    }

    fn description(&self) -> &str {
        "Android Dex Builder"
    }

    fn category(&self) -> BuilderCategory {
        BuilderCategory::ClassPostProcessor
    }

    async fn build(
        &self,
        context: &CompileContext,
        chunk: &ModuleChunk,
    ) -> Result<ExitCode, BuildError> {
        if context.is_compiling_tests() || !contains_android_facet(context.project(), chunk) {
            return Ok(ExitCode::Ok);
        }
        context.process_message(BuildMessage::progress("Executing DEX"));

        match self.do_build(context, chunk).await {
            Ok(code) => Ok(code),
            Err(err) => {
                let message = describe_failure(&err);
                context.report(BUILDER_NAME, MessageKind::Error, message.clone());
                Err(BuildError::project_build(message, err))
            }
        }
    }
}

fn contains_android_facet(project: &ProjectModel, chunk: &ModuleChunk) -> bool {
    chunk
        .module_names()
        .iter()
        .filter_map(|name| project.module(name))
        .any(Module::has_android_facet)
}

fn resolve_sdk(project: &ProjectModel, module: &Module) -> Option<AndroidSdk> {
    let definition = project.module_sdk(module)?;
    match AndroidSdk::from_definition(definition) {
        Ok(sdk) => Some(sdk),
        Err(err) if err.is_unspecified() => None,
        // Present but incomplete: let target resolution report it
        Err(_) => Some(AndroidSdk::new(
            definition.name.clone(),
            definition.home.clone().unwrap_or_default(),
            definition.build_target.clone().unwrap_or_default(),
        )),
    }
}

/// Deduplicated dx input set: package roots of the module's own classes,
/// packaged external libraries, and outputs of modules it depends on
fn collect_inputs(
    paths: &ProjectPaths,
    module: &Module,
    classes_dir: &Path,
) -> Result<BTreeSet<PathBuf>, BuildError> {
    let mut inputs = BTreeSet::new();

    add_subdirectories(classes_dir, &mut inputs)?;
    inputs.extend(paths.external_libraries(module)?);

    for dir in paths.dependent_output_dirs(module)? {
        if dir != classes_dir && dir.is_dir() {
            inputs.insert(dir);
        }
    }

    Ok(inputs)
}

/// Only directories directly under `base`, symlinked ones included; loose
/// files at the root are not in a package
fn add_subdirectories(base: &Path, result: &mut BTreeSet<PathBuf>) -> Result<(), CoreError> {
    for entry in WalkDir::new(base).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| CoreError::ReadDir {
            path: base.to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_dir() {
            result.insert(entry.into_path());
        }
    }
    Ok(())
}

/// Text for an unexpected failure: its message, or a debug dump of the error
/// chain when it has none
pub fn describe_failure(err: &(dyn std::error::Error + 'static)) -> String {
    let message = err.to_string();
    if !message.trim().is_empty() {
        return message;
    }

    let mut dump = format!("{:?}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        dump.push_str(&format!("\nCaused by: {:?}", cause));
        source = cause.source();
    }
    format!("Internal error: \n{}", dump)
}
