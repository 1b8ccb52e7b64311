//! Project Model
//!
//! The build model the dex step runs against: SDK definitions, modules with
//! their dependencies and output directories, and the chunks modules are
//! compiled in. A model is loaded from a TOML project file and recomputed on
//! every build; nothing here is persisted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};

/// Dependency scope
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    /// Needed at compile time and packaged
    #[default]
    Compile,
    /// Needed at compile time, supplied by the device at runtime
    Provided,
    /// Only visible to tests
    Test,
}

impl DependencyScope {
    /// Whether entries with this scope end up in production packaging
    pub fn is_packaged(&self) -> bool {
        matches!(self, DependencyScope::Compile)
    }
}

/// SDK type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdkKind {
    Android,
    Java,
}

/// Named SDK a module can reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SdkDefinition {
    pub name: String,
    pub kind: SdkKind,
    /// SDK root; Android entries without one are filled in from config or detection
    #[serde(default)]
    pub home: Option<PathBuf>,
    /// Target platform id, e.g. `android-19`
    #[serde(default)]
    pub build_target: Option<String>,
    /// JDK used to run SDK tools
    #[serde(default)]
    pub java_home: Option<PathBuf>,
}

/// Android facet attached to a module
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AndroidFacet {
    /// Library modules are packaged by the modules depending on them
    pub library: bool,
}

/// Edge to another module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleDependency {
    pub module: String,
    #[serde(default)]
    pub scope: DependencyScope,
}

/// External library (jar or class directory)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Library {
    pub path: PathBuf,
    #[serde(default)]
    pub scope: DependencyScope,
}

/// A unit of compilation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Module {
    pub name: String,
    /// Name of the SDK definition this module compiles against
    pub sdk: Option<String>,
    pub android: Option<AndroidFacet>,
    pub dependencies: Vec<ModuleDependency>,
    pub libraries: Vec<Library>,
    /// Production class output
    pub output_dir: Option<PathBuf>,
    /// Test class output
    pub test_output_dir: Option<PathBuf>,
    /// Where packaged artifacts such as classes.dex go
    pub packaged_output_dir: Option<PathBuf>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_android_facet(&self) -> bool {
        self.android.is_some()
    }

    pub fn is_android_library(&self) -> bool {
        self.android.as_ref().map(|f| f.library).unwrap_or(false)
    }

    fn packaged_dependencies(&self) -> impl Iterator<Item = &ModuleDependency> {
        self.dependencies.iter().filter(|d| d.scope.is_packaged())
    }
}

/// A set of modules compiled together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleChunk {
    modules: Vec<String>,
}

impl ModuleChunk {
    pub fn new(modules: Vec<String>) -> Self {
        Self { modules }
    }

    pub fn single(module: impl Into<String>) -> Self {
        Self::new(vec![module.into()])
    }

    /// Module names in this chunk
    pub fn module_names(&self) -> &[String] {
        &self.modules
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    pub fn presentable_name(&self) -> String {
        self.modules.join(", ")
    }
}

/// The whole build model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectModel {
    pub name: String,
    /// Default root for module outputs
    pub output_root: Option<PathBuf>,
    pub sdks: Vec<SdkDefinition>,
    pub modules: Vec<Module>,
}

impl ProjectModel {
    /// Load a project file; relative paths resolve against its directory
    pub async fn load(path: &Path) -> Result<Self> {
        info!("Loading project from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&contents, base_dir)
    }

    /// Parse and validate project text
    pub fn from_toml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let mut project: ProjectModel = toml::from_str(contents)?;
        project.resolve_paths(base_dir);
        project.validate()?;
        debug!(
            "Project '{}': {} modules, {} SDKs",
            project.name,
            project.modules.len(),
            project.sdks.len()
        );
        Ok(project)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };

        if let Some(root) = self.output_root.as_mut() {
            resolve(root);
        }
        for sdk in &mut self.sdks {
            sdk.home.iter_mut().for_each(resolve);
            sdk.java_home.iter_mut().for_each(resolve);
        }
        for module in &mut self.modules {
            module.output_dir.iter_mut().for_each(resolve);
            module.test_output_dir.iter_mut().for_each(resolve);
            module.packaged_output_dir.iter_mut().for_each(resolve);
            for library in &mut module.libraries {
                resolve(&mut library.path);
            }
        }
    }

    /// Check module names are unique and every dependency exists
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(CoreError::Project("module without a name".into()));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(CoreError::Project(format!("duplicate module '{}'", module.name)));
            }
        }
        for module in &self.modules {
            for dep in &module.dependencies {
                if !seen.contains(dep.module.as_str()) {
                    return Err(CoreError::UnknownModule(dep.module.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn sdk(&self, name: &str) -> Option<&SdkDefinition> {
        self.sdks.iter().find(|s| s.name == name)
    }

    /// SDK definition referenced by a module
    pub fn module_sdk(&self, module: &Module) -> Option<&SdkDefinition> {
        module.sdk.as_deref().and_then(|name| self.sdk(name))
    }

    /// Modules of a chunk, in chunk order
    pub fn chunk_modules(&self, chunk: &ModuleChunk) -> Result<Vec<&Module>> {
        chunk
            .module_names()
            .iter()
            .map(|name| {
                self.module(name)
                    .ok_or_else(|| CoreError::UnknownModule(name.clone()))
            })
            .collect()
    }

    /// Group modules into chunks (strongly connected components of the
    /// dependency graph), dependencies before their dependents.
    pub fn chunks(&self) -> Result<Vec<ModuleChunk>> {
        let index: HashMap<&str, usize> = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();

        let mut edges = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let targets = module
                .dependencies
                .iter()
                .map(|d| {
                    index
                        .get(d.module.as_str())
                        .copied()
                        .ok_or_else(|| CoreError::UnknownModule(d.module.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            edges.push(targets);
        }

        let components = Tarjan::new(&edges).run();
        Ok(components
            .into_iter()
            .map(|component| {
                let mut names: Vec<String> = component
                    .into_iter()
                    .map(|i| self.modules[i].name.clone())
                    .collect();
                names.sort();
                ModuleChunk::new(names)
            })
            .collect())
    }
}

/// Tarjan's SCC algorithm; components come out dependencies first
struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(edges: &'a [Vec<usize>]) -> Self {
        let n = edges.len();
        Self {
            edges,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for v in 0..self.edges.len() {
            if self.index[v].is_none() {
                self.connect(v);
            }
        }
        self.components
    }

    fn connect(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for &w in &self.edges[v] {
            match self.index[w] {
                None => {
                    self.connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Output and classpath lookups over a project model
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    project: Arc<ProjectModel>,
}

impl ProjectPaths {
    pub fn new(project: Arc<ProjectModel>) -> Self {
        Self { project }
    }

    pub fn project(&self) -> &ProjectModel {
        &self.project
    }

    /// Class output directory of a module, explicit or under the project output root
    pub fn module_output_dir(&self, module: &Module, tests: bool) -> Option<PathBuf> {
        let explicit = if tests {
            module.test_output_dir.clone()
        } else {
            module.output_dir.clone()
        };
        explicit.or_else(|| {
            let kind = if tests { "test" } else { "production" };
            self.project
                .output_root
                .as_ref()
                .map(|root| root.join(kind).join(&module.name))
        })
    }

    /// Directory packaged artifacts are written to
    pub fn packaged_output_dir(&self, module: &Module) -> Option<PathBuf> {
        module
            .packaged_output_dir
            .clone()
            .or_else(|| self.module_output_dir(module, false))
    }

    /// Modules reachable over packaged dependency edges, breadth first, excluding `module`
    pub fn transitive_dependencies(&self, module: &Module) -> Result<Vec<&Module>> {
        let mut visited: HashSet<&str> = HashSet::from([module.name.as_str()]);
        let mut queue: VecDeque<&Module> = VecDeque::from([module]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dep in current.packaged_dependencies() {
                if !visited.insert(dep.module.as_str()) {
                    continue;
                }
                let dep_module = self
                    .project
                    .module(&dep.module)
                    .ok_or_else(|| CoreError::UnknownModule(dep.module.clone()))?;
                result.push(dep_module);
                queue.push_back(dep_module);
            }
        }

        Ok(result)
    }

    /// Packaged external libraries of a module and everything it depends on
    pub fn external_libraries(&self, module: &Module) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let modules = std::iter::once(module).chain(self.transitive_dependencies(module)?);

        for m in modules {
            for library in m.libraries.iter().filter(|l| l.scope.is_packaged()) {
                if seen.insert(library.path.clone()) {
                    result.push(library.path.clone());
                }
            }
        }
        Ok(result)
    }

    /// Production output directories of the modules a module depends on
    pub fn dependent_output_dirs(&self, module: &Module) -> Result<Vec<PathBuf>> {
        Ok(self
            .transitive_dependencies(module)?
            .into_iter()
            .filter_map(|m| self.module_output_dir(m, false))
            .collect())
    }
}
