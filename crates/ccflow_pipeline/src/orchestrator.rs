//! The per-project orchestrator.
//!
//! [`Project`] is the only writer of a project's [`ProjectState`]. It keeps
//! the state behind a mutex that is released while tools run, so status
//! queries and cancellation stay responsive during a long stage.
//!
//! Every run also holds the project's [`RunLock`] from the moment the stage
//! is marked running until its result is saved. That is what keeps a second
//! handle, or a second `ccflow` process, from starting another stage or
//! treating the running one as interrupted.

use crate::error::PipelineError;
use crate::executor::{executor_for, StageContext, StagePlan, StageResult};
use crate::fingerprint;
use crate::layout::{create_layout, relative_to};
use crate::machine;
use crate::schedule::{execute, Execution, InvocationRecord, InvocationStatus};
use ccflow_common::ContentHash;
use ccflow_config::{load_config, save_config, ConfigError, ProjectConfig, SimProfile, CONFIG_FILE};
use ccflow_diagnostics::{Category, Diagnostic, DiagnosticCode};
use ccflow_hierarchy::{
    CycleError, HierarchyError, HierarchyGraph, HierarchySnapshot, TopTarget,
    UnresolvedReference,
};
use ccflow_process::{CancelHandle, CancelSignal, OutputObserver, ProcessSpec, Runner};
use ccflow_source::{ChangeSet, HdlLanguage, IndexReport, ParseWarning, UnitRole};
use ccflow_state::{
    store, Artifact, FailureReport, ProjectState, RunLock, Stage, StageManifest, StageRecord,
    StageStatus, LOCK_FILE,
};
use ccflow_toolchain::{Registry, Tool};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What a re-index found.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Files added, modified, or removed since the previous index.
    pub changes: ChangeSet,
    /// Non-fatal indexing problems.
    pub warnings: Vec<ParseWarning>,
    /// Instantiations of units outside the index.
    pub unresolved: Vec<UnresolvedReference>,
    /// Set when the hierarchy is cyclic; no stage can run until it is fixed.
    pub cycle: Option<CycleError>,
    /// Whether `ccflow.toml` changed since the last refresh.
    pub config_changed: bool,
    /// Stages that went from `succeeded` to `stale`.
    pub newly_stale: Vec<Stage>,
}

/// The outcome of one [`Project::run_stage`] call.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// The stage that ran.
    pub stage: Stage,
    /// Its status afterwards: `succeeded` or `failed`.
    pub status: StageStatus,
    /// The unit the stage was built around.
    pub top: String,
    /// Produced files, on success.
    pub artifacts: Vec<Artifact>,
    /// Cause and suggestion, on failure.
    pub failure: Option<FailureReport>,
    /// Downstream stages invalidated by this run.
    pub newly_stale: Vec<Stage>,
}

impl StageReport {
    /// `true` if the stage succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == StageStatus::Succeeded
    }

    /// The failure as a diagnostic, if the stage failed.
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        self.failure
            .as_ref()
            .map(|failure| failure_diagnostic(self.stage, failure))
    }
}

/// A `P2xx` diagnostic for a failed stage: the cause, the tool's last output
/// lines as notes, and the suggested next action.
pub fn failure_diagnostic(stage: Stage, failure: &FailureReport) -> Diagnostic {
    let number = 201 + Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0) as u16;
    let code = DiagnosticCode::new(Category::Pipeline, number);
    let mut diag = Diagnostic::error(code, format!("{stage} failed: {}", failure.cause));
    for line in &failure.tail {
        diag = diag.with_note(line.clone());
    }
    diag.with_help(failure.suggestion.clone())
}

/// A read-only summary of a project.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Project name.
    pub name: String,
    /// Project root.
    pub root: PathBuf,
    /// Every stage's record, in pipeline order.
    pub stages: Vec<(Stage, StageRecord)>,
    /// Number of indexed files.
    pub files: usize,
    /// Number of indexed design units.
    pub units: usize,
    /// The synthesis top, or why none could be chosen.
    pub synthesis_top: Result<String, HierarchyError>,
    /// The simulation top, or why none could be chosen.
    pub simulation_top: Result<String, HierarchyError>,
    /// Indented hierarchy below the synthesis top.
    pub tree: Option<String>,
    /// Instantiations of units outside the index.
    pub unresolved: Vec<UnresolvedReference>,
    /// Set when the hierarchy is cyclic.
    pub cycle: Option<CycleError>,
    /// Problems found by the last index.
    pub warnings: Vec<ParseWarning>,
}

/// A finished simulation whose waveform can be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    /// The simulation stage.
    pub stage: Stage,
    /// `succeeded`, or `stale` if its inputs changed since.
    pub status: StageStatus,
    /// The VCD file, relative to the project root.
    pub path: PathBuf,
    /// When the stage finished.
    pub finished_at: Option<DateTime<Utc>>,
}

struct Inner {
    state: ProjectState,
    graph: Result<HierarchyGraph, CycleError>,
    warnings: Vec<ParseWarning>,
    last_refresh: RefreshReport,
    /// The stage this handle is running.
    active: Option<Stage>,
}

/// Everything a started run needs once the mutex is released.
struct Started {
    plan: StagePlan,
    input: ContentHash,
    tools: BTreeMap<Tool, PathBuf>,
    signal: CancelSignal,
    lock: RunLock,
}

enum Prepared {
    Started(Started),
    Finished(StageReport),
}

/// One open project.
pub struct Project {
    root: PathBuf,
    inner: Mutex<Inner>,
    registry: Arc<Registry>,
    runner: Runner,
    cancel: CancelHandle,
}

impl Project {
    /// Creates the directory layout and configuration for a new project at
    /// `root`, or opens the project already there.
    pub fn create(root: impl Into<PathBuf>, name: &str) -> Result<Self, PipelineError> {
        let root = root.into();
        create_layout(&root).map_err(|source| PipelineError::Io {
            path: root.clone(),
            source,
        })?;
        let root = canonical(&root)?;
        if !root.join(CONFIG_FILE).is_file() {
            save_config(&root, &ProjectConfig::new(name))?;
            log::info!("created project {name} at {}", root.display());
        }
        if store::state_path(&root).is_file() {
            return Self::open(root);
        }
        Self::rebuild(root)
    }

    /// Opens an existing project.
    ///
    /// Stages left `running` by a process that died are marked failed. A
    /// stage another handle or process is still running keeps its `running`
    /// status. A missing or corrupt record is an error; see
    /// [`Project::rebuild`].
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = canonical(&root.into())?;
        let config = load_config(&root)?;
        let mut state = store::load(&store::state_path(&root))?;
        if state.root != root {
            log::info!("project moved from {}", state.root.display());
            state.root = root.clone();
        }
        if lock_held(&root)? {
            if let Some(stage) = state.running_stage() {
                log::info!("{stage} is running in another process");
            }
        } else {
            for stage in state.recover_interrupted() {
                log::warn!("{stage} was interrupted; marked failed");
            }
        }
        Self::assemble(root, config, state)
    }

    /// Opens a project with a fresh record, discarding any stage history.
    ///
    /// Refused while a stage of the project is running.
    pub fn rebuild(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = canonical(&root.into())?;
        if lock_held(&root)? {
            return Err(PipelineError::Locked {
                pid: RunLock::holder(&root).map(|h| h.pid),
            });
        }
        let config = load_config(&root)?;
        let missing = crate::layout::missing_dirs(&root);
        if !missing.is_empty() {
            create_layout(&root).map_err(|source| PipelineError::Io {
                path: root.clone(),
                source,
            })?;
        }
        let state = ProjectState::new(root.clone(), config.clone());
        Self::assemble(root, config, state)
    }

    fn assemble(
        root: PathBuf,
        config: ProjectConfig,
        state: ProjectState,
    ) -> Result<Self, PipelineError> {
        let graph = HierarchyGraph::build(&state.index.units);
        let project = Project {
            registry: Arc::new(Registry::from_config(&config.toolchain)),
            root,
            inner: Mutex::new(Inner {
                state,
                graph,
                warnings: Vec::new(),
                last_refresh: RefreshReport::default(),
                active: None,
            }),
            runner: Runner::new(),
            cancel: CancelHandle::new(),
        };
        project.refresh()?;
        Ok(project)
    }

    /// Restricts tool lookup to `path` instead of the process `PATH`.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        let registry = {
            let inner = self.lock();
            Registry::from_config(&inner.state.config.toolchain).with_search_path(path)
        };
        self.registry = Arc::new(registry);
        self
    }

    /// Overrides the grace period between terminate and kill on cancel.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.runner = Runner::with_grace(grace);
        self
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The toolchain registry this project resolves tools through.
    ///
    /// Each handle has its own registry, built from its project's
    /// `[toolchain]` paths, so resolutions are cached for the life of the
    /// handle and never shared with another project.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// A copy of the current state.
    pub fn state(&self) -> ProjectState {
        self.lock().state.clone()
    }

    /// The active configuration.
    pub fn config(&self) -> ProjectConfig {
        self.lock().state.config.clone()
    }

    /// Re-reads the configuration, re-indexes the sources, rebuilds the
    /// hierarchy, and re-evaluates staleness.
    pub fn refresh(&self) -> Result<RefreshReport, PipelineError> {
        let mut inner = self.lock();
        let report = self.refresh_locked(&mut inner)?;
        self.save_locked(&inner)?;
        Ok(report)
    }

    fn refresh_locked(&self, inner: &mut Inner) -> Result<RefreshReport, PipelineError> {
        let config = load_config(&self.root)?;
        let config_changed = config != inner.state.config;
        if config_changed {
            self.sync_registry(&config);
            inner.state.config = config;
        }

        let dirs: Vec<PathBuf> = inner
            .state
            .config
            .project
            .sources
            .iter()
            .map(|d| self.root.join(d))
            .collect();
        let IndexReport { index, warnings } = ccflow_source::index(&dirs);
        let changes = index.detect_changes(&inner.state.index);
        if !changes.is_empty() {
            log::info!(
                "sources changed: {} new, {} modified, {} deleted",
                changes.new_files.len(),
                changes.modified_files.len(),
                changes.deleted_files.len()
            );
        }
        for warning in &warnings {
            log::warn!("{warning}");
        }
        inner.state.index = index;
        inner.graph = HierarchyGraph::build(&inner.state.index.units);
        let (unresolved, cycle) = match &inner.graph {
            Ok(graph) => {
                inner.state.hierarchy = graph.snapshot();
                (graph.unresolved().to_vec(), None)
            }
            Err(cycle) => {
                log::warn!("{cycle}");
                inner.state.hierarchy = HierarchySnapshot::default();
                (Vec::new(), Some(cycle.clone()))
            }
        };
        inner.warnings = warnings.clone();
        let newly_stale = machine::refresh_staleness(&mut inner.state);
        let report = RefreshReport {
            changes,
            warnings,
            unresolved,
            cycle,
            config_changed,
            newly_stale,
        };
        inner.last_refresh = report.clone();
        Ok(report)
    }

    /// The report of the most recent refresh, including the one made when
    /// the project was opened.
    pub fn last_refresh(&self) -> RefreshReport {
        self.lock().last_refresh.clone()
    }

    fn sync_registry(&self, config: &ProjectConfig) {
        for tool in Tool::ALL {
            let path = config.toolchain.path(tool.name()).cloned();
            if self.registry.configured_path(tool) != path {
                self.registry.set_path(tool, path);
            }
        }
    }

    /// Applies `edit` to the configuration on disk, then refreshes.
    ///
    /// The edited configuration is validated before it is written.
    pub fn update_config(
        &self,
        edit: impl FnOnce(&mut ProjectConfig),
    ) -> Result<RefreshReport, PipelineError> {
        let ((), report) = self.edit_config(|config| {
            edit(config);
            Ok(())
        })?;
        Ok(report)
    }

    /// Like [`Project::update_config`] for edits that can be refused.
    fn edit_config<T>(
        &self,
        edit: impl FnOnce(&mut ProjectConfig) -> Result<T, ConfigError>,
    ) -> Result<(T, RefreshReport), PipelineError> {
        let mut inner = self.lock();
        let mut config = load_config(&self.root)?;
        let value = edit(&mut config)?;
        save_config(&self.root, &config)?;
        let report = self.refresh_locked(&mut inner)?;
        self.save_locked(&inner)?;
        Ok((value, report))
    }

    /// Adds or replaces the user simulation profile `name`. Returns the
    /// profile it replaced.
    pub fn create_profile(
        &self,
        name: &str,
        profile: SimProfile,
    ) -> Result<Option<SimProfile>, PipelineError> {
        let (replaced, _) =
            self.edit_config(|config| config.simulation.create_profile(name, profile))?;
        match &replaced {
            Some(_) => log::warn!("replaced simulation profile {name}"),
            None => log::info!("created simulation profile {name}"),
        }
        Ok(replaced)
    }

    /// Removes the user simulation profile `name`.
    pub fn delete_profile(&self, name: &str) -> Result<SimProfile, PipelineError> {
        let (removed, _) = self.edit_config(|config| config.simulation.delete_profile(name))?;
        log::info!("deleted simulation profile {name}");
        Ok(removed)
    }

    /// Writes the profile `name` to `path` for another project to import.
    pub fn export_profile(&self, name: &str, path: &Path) -> Result<(), PipelineError> {
        ccflow_config::export_profile(&self.config().simulation, name, path)?;
        Ok(())
    }

    /// Adds the profile in `path` as a user profile. Returns its name.
    pub fn import_profile(&self, path: &Path) -> Result<String, PipelineError> {
        let (name, profile) = ccflow_config::read_profile(path)?.into_profile();
        self.create_profile(&name, profile)?;
        Ok(name)
    }

    /// Sets or clears the explicit path of `tool`.
    pub fn set_tool_path(
        &self,
        tool: Tool,
        path: Option<PathBuf>,
    ) -> Result<RefreshReport, PipelineError> {
        self.update_config(|config| {
            let paths = &mut config.toolchain.paths;
            match path {
                Some(p) => paths.insert(tool.name().to_string(), p),
                None => paths.remove(tool.name()),
            };
        })
    }

    /// Records `name` as the synthesis top, or clears the choice.
    pub fn set_top(&self, name: Option<&str>) -> Result<RefreshReport, PipelineError> {
        let name = self.check_top(TopTarget::Synthesis, name)?;
        self.update_config(|config| config.synthesis.top = name)
    }

    /// Records `name` as the simulation top, or clears the choice.
    pub fn set_testbench(&self, name: Option<&str>) -> Result<RefreshReport, PipelineError> {
        let name = self.check_top(TopTarget::Simulation, name)?;
        self.update_config(|config| config.simulation.testbench = name)
    }

    /// The unit `name` resolves to, as it is spelled in the index.
    fn check_top(
        &self,
        target: TopTarget,
        name: Option<&str>,
    ) -> Result<Option<String>, PipelineError> {
        let Some(name) = name else {
            return Ok(None);
        };
        let inner = self.lock();
        let graph = inner
            .graph
            .as_ref()
            .map_err(|c| HierarchyError::Cycle(c.clone()))?;
        Ok(Some(graph.select_top(target, Some(name))?))
    }

    /// Copies an HDL file into `src/` or `testbench/` and re-indexes.
    ///
    /// A file already inside a source directory is only re-indexed. A
    /// different file of the same name already in the destination is
    /// overwritten only when `replace` is set.
    pub fn add_source(
        &self,
        path: &Path,
        role: UnitRole,
        replace: bool,
    ) -> Result<(PathBuf, RefreshReport), PipelineError> {
        if HdlLanguage::detect(path).is_none() {
            return Err(PipelineError::NotHdl(path.to_path_buf()));
        }
        let io = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let source = canonical(path)?;
        let dest = if self.in_source_dir(&source) {
            source
        } else {
            let dir = match role {
                UnitRole::Design => "src",
                UnitRole::Testbench => "testbench",
            };
            let name = source
                .file_name()
                .ok_or_else(|| PipelineError::NotHdl(path.to_path_buf()))?;
            let dest = self.root.join(dir).join(name);
            let shown = relative_to(&self.root, &dest);
            if dest.exists() && !same_content(&source, &dest) {
                if !replace {
                    return Err(PipelineError::SourceExists(shown));
                }
                log::warn!("replacing {}", shown.display());
            }
            std::fs::create_dir_all(self.root.join(dir)).map_err(io)?;
            std::fs::copy(&source, &dest).map_err(io)?;
            log::info!("added {}", shown.display());
            dest
        };
        let report = self.refresh()?;
        Ok((relative_to(&self.root, &dest), report))
    }

    /// Deletes a source file and re-indexes.
    pub fn remove_source(&self, path: &Path) -> Result<RefreshReport, PipelineError> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let full = canonical(&full)?;
        if !self.in_source_dir(&full) || !full.is_file() {
            return Err(PipelineError::NotASource(path.to_path_buf()));
        }
        std::fs::remove_file(&full).map_err(|source| PipelineError::Io {
            path: full.clone(),
            source,
        })?;
        log::info!("removed {}", relative_to(&self.root, &full).display());
        self.refresh()
    }

    fn in_source_dir(&self, path: &Path) -> bool {
        let inner = self.lock();
        inner
            .state
            .config
            .project
            .sources
            .iter()
            .any(|dir| path.starts_with(self.root.join(dir)))
    }

    /// Runs one stage to completion.
    ///
    /// Ordering violations, an invalid hierarchy, and planning failures are
    /// returned as errors and change nothing. Once the stage has started,
    /// every outcome, including a missing tool or a cancellation, is
    /// recorded on the stage and returned as a report.
    pub async fn run_stage(
        &self,
        stage: Stage,
        observer: &dyn OutputObserver,
    ) -> Result<StageReport, PipelineError> {
        let started = match self.prepare(stage)? {
            Prepared::Started(started) => started,
            Prepared::Finished(report) => return Ok(report),
        };
        let executor = executor_for(stage);
        let records = {
            let env = Execution {
                root: &self.root,
                tools: &started.tools,
                runner: &self.runner,
                observer,
                cancel: &started.signal,
            };
            execute(&started.plan, executor.as_ref(), &env).await
        };
        self.finish(stage, started, &records)
    }

    fn prepare(&self, stage: Stage) -> Result<Prepared, PipelineError> {
        let mut inner = self.lock();
        if let Some(running) = inner.active {
            return Err(PipelineError::StageBusy {
                requested: stage,
                running,
            });
        }
        let lock = RunLock::try_acquire(&self.root, stage).map_err(|source| PipelineError::Io {
            path: self.root.join(LOCK_FILE),
            source,
        })?;
        let Some(lock) = lock else {
            return Err(self.held_elsewhere(stage));
        };
        self.sync_stage_records(&mut inner);
        self.refresh_locked(&mut inner)?;
        let graph = match &inner.graph {
            Ok(graph) => graph.clone(),
            Err(cycle) => return Err(HierarchyError::Cycle(cycle.clone()).into()),
        };
        machine::check_start(&inner.state, stage)?;

        let plan = executor_for(stage).plan(&StageContext {
            root: &self.root,
            config: &inner.state.config,
            index: &inner.state.index,
            graph: &graph,
        })?;
        let input = fingerprint::compute(&inner.state, stage)
            .map_err(|source| PipelineError::Fingerprint { stage, source })?;

        let mut tools = BTreeMap::new();
        for tool in plan.tools() {
            match self.registry.resolve(tool) {
                Ok(entry) => {
                    tools.insert(tool, entry.path);
                }
                Err(e) => {
                    let report = FailureReport {
                        cause: format!("{stage} failed: {e}"),
                        tail: Vec::new(),
                        suggestion: format!(
                            "install {tool} or run `ccflow toolchain set-path {tool} <PATH>`"
                        ),
                    };
                    machine::begin(&mut inner.state, stage)?;
                    machine::fail(&mut inner.state, stage, report)?;
                    let newly_stale = machine::refresh_staleness(&mut inner.state);
                    self.save_locked(&inner)?;
                    return Ok(Prepared::Finished(report_for(
                        &inner.state,
                        stage,
                        plan.top,
                        newly_stale,
                    )));
                }
            }
        }

        for dir in &plan.dirs {
            let dir = self.root.join(dir);
            std::fs::create_dir_all(&dir).map_err(|source| PipelineError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        let previous = inner.state.stages.get(&stage).cloned().unwrap_or_default();
        machine::begin(&mut inner.state, stage)?;
        if let Err(e) = self.save_locked(&inner) {
            *inner.state.record_mut(stage) = previous;
            return Err(e);
        }
        inner.active = Some(stage);
        self.cancel.reset();
        Ok(Prepared::Started(Started {
            plan,
            input,
            tools,
            signal: self.cancel.signal(),
            lock,
        }))
    }

    /// The error for a run refused because another handle or process holds
    /// the lock.
    fn held_elsewhere(&self, requested: Stage) -> PipelineError {
        let holder = RunLock::holder(&self.root);
        let running = holder.as_ref().map(|h| h.stage).or_else(|| {
            store::load(&store::state_path(&self.root))
                .ok()
                .and_then(|state| state.running_stage())
        });
        match running {
            Some(running) => PipelineError::StageBusy { requested, running },
            None => PipelineError::Locked {
                pid: holder.map(|h| h.pid),
            },
        }
    }

    /// Takes over stage records another handle saved since this one last
    /// wrote. Called with the run lock held and nothing active, so a record
    /// still `running` belongs to a process that died.
    fn sync_stage_records(&self, inner: &mut Inner) {
        match store::load(&store::state_path(&self.root)) {
            Ok(persisted) if persisted.stages != inner.state.stages => {
                log::debug!("picked up stage records saved by another handle");
                inner.state.stages = persisted.stages;
            }
            Ok(_) => {}
            Err(e) => log::debug!("keeping in-memory stage records: {e}"),
        }
        for stage in inner.state.recover_interrupted() {
            log::warn!("{stage} was interrupted; marked failed");
        }
    }

    fn finish(
        &self,
        stage: Stage,
        started: Started,
        records: &[InvocationRecord],
    ) -> Result<StageReport, PipelineError> {
        for record in records {
            let tool = started.plan.invocations[record.id].tool;
            match record.status {
                InvocationStatus::Skipped { .. } | InvocationStatus::NotStarted => {}
                _ => self.registry.record_launch(tool, record.launched()),
            }
        }
        let result = executor_for(stage).interpret(&started.plan, records, &self.root);

        let mut inner = self.lock();
        inner.active = None;
        match result {
            StageResult::Succeeded { artifacts } => {
                match collect_manifest(&self.root, stage, artifacts) {
                    Ok(manifest) => {
                        machine::succeed(&mut inner.state, stage, started.input, &manifest)?
                    }
                    Err(e) => {
                        let report = FailureReport {
                            cause: format!("cannot record {stage} outputs: {e}"),
                            tail: Vec::new(),
                            suggestion: format!("run {stage} again"),
                        };
                        machine::fail(&mut inner.state, stage, report)?
                    }
                }
            }
            StageResult::Failed(report) => machine::fail(&mut inner.state, stage, report)?,
        }
        let newly_stale = machine::refresh_staleness(&mut inner.state);
        self.save_locked(&inner)?;
        drop(started.lock);
        Ok(report_for(&inner.state, stage, started.plan.top, newly_stale))
    }

    /// Asks the stage this handle runs to stop. Returns `false` if it runs
    /// nothing; a stage run by another process is not affected.
    ///
    /// The stage finishes as `failed` once its process is confirmed dead.
    pub fn cancel(&self) -> bool {
        let running = self.lock().active;
        if let Some(stage) = running {
            log::info!("cancelling {stage}");
            self.cancel.cancel();
        }
        running.is_some()
    }

    /// Summarises the project without re-indexing.
    pub fn status(&self) -> StatusReport {
        let inner = self.lock();
        let state = &inner.state;
        let config = &state.config;
        let (synthesis_top, simulation_top, tree, unresolved, cycle) = match &inner.graph {
            Ok(graph) => {
                let synthesis_top =
                    graph.select_top(TopTarget::Synthesis, config.synthesis.top.as_deref());
                let simulation_top =
                    graph.select_top(TopTarget::Simulation, config.simulation.testbench.as_deref());
                let tree = synthesis_top.as_ref().ok().map(|top| graph.render_tree(top));
                (
                    synthesis_top,
                    simulation_top,
                    tree,
                    graph.unresolved().to_vec(),
                    None,
                )
            }
            Err(cycle) => (
                Err(HierarchyError::Cycle(cycle.clone())),
                Err(HierarchyError::Cycle(cycle.clone())),
                None,
                Vec::new(),
                Some(cycle.clone()),
            ),
        };
        StatusReport {
            name: config.project.name.clone(),
            root: self.root.clone(),
            stages: Stage::ALL
                .into_iter()
                .map(|s| (s, state.stages.get(&s).cloned().unwrap_or_default()))
                .collect(),
            files: state.index.files.len(),
            units: state.index.units.len(),
            synthesis_top,
            simulation_top,
            tree,
            unresolved,
            cycle,
            warnings: inner.warnings.clone(),
        }
    }

    /// Simulations whose last run left a waveform on disk, in pipeline order.
    ///
    /// The waveform is taken from the stage's manifest, so a stage that
    /// failed after an earlier success lists nothing.
    pub fn waveforms(&self) -> Vec<Waveform> {
        let inner = self.lock();
        Stage::ALL
            .into_iter()
            .filter(|stage| stage.is_simulation())
            .filter_map(|stage| {
                let record = inner.state.stages.get(&stage)?;
                if !matches!(record.status, StageStatus::Succeeded | StageStatus::Stale) {
                    return None;
                }
                let manifest = match StageManifest::read(&self.root, stage) {
                    Ok(manifest) => manifest?,
                    Err(e) => {
                        log::debug!("cannot read {stage} manifest: {e}");
                        return None;
                    }
                };
                let path = manifest
                    .artifacts
                    .into_iter()
                    .map(|a| a.path)
                    .find(|p| p.extension().is_some_and(|e| e == "vcd"))?;
                self.root.join(&path).is_file().then(|| Waveform {
                    stage,
                    status: record.status,
                    path,
                    finished_at: record.updated_at,
                })
            })
            .collect()
    }

    /// The waveform of `stage`, or the most recently finished one.
    pub fn waveform(&self, stage: Option<Stage>) -> Result<Waveform, PipelineError> {
        let waveforms = self.waveforms();
        let found = match stage {
            Some(stage) => waveforms.into_iter().find(|w| w.stage == stage),
            None => waveforms.into_iter().max_by_key(|w| w.finished_at),
        };
        found.ok_or(PipelineError::NoWaveform { stage })
    }

    /// Opens a waveform in GTKWave without waiting for the viewer to close.
    pub fn view_waveform(&self, stage: Option<Stage>) -> Result<Waveform, PipelineError> {
        let waveform = self.waveform(stage)?;
        let viewer = self.registry.resolve(Tool::Gtkwave)?;
        let spec = ProcessSpec::new(viewer.path, &self.root)
            .args([waveform.path.to_string_lossy().into_owned()]);
        let pid = self.runner.launch_detached(&spec)?;
        self.registry.record_launch(Tool::Gtkwave, true);
        log::info!(
            "opened {} in gtkwave (pid {pid})",
            waveform.path.display()
        );
        Ok(waveform)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_locked(&self, inner: &Inner) -> Result<(), PipelineError> {
        store::save(&inner.state, &store::state_path(&self.root))?;
        Ok(())
    }
}

fn lock_held(root: &Path) -> Result<bool, PipelineError> {
    RunLock::is_held(root).map_err(|source| PipelineError::Io {
        path: root.join(LOCK_FILE),
        source,
    })
}

fn same_content(a: &Path, b: &Path) -> bool {
    match (ContentHash::from_file(a), ContentHash::from_file(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn canonical(path: &Path) -> Result<PathBuf, PipelineError> {
    std::fs::canonicalize(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_manifest(
    root: &Path,
    stage: Stage,
    artifacts: Vec<PathBuf>,
) -> std::io::Result<StageManifest> {
    let artifacts = artifacts
        .into_iter()
        .map(|path| Artifact::from_file(root, path))
        .collect::<std::io::Result<Vec<_>>>()?;
    let manifest = StageManifest { stage, artifacts };
    manifest.write(root)?;
    Ok(manifest)
}

fn report_for(
    state: &ProjectState,
    stage: Stage,
    top: String,
    newly_stale: Vec<Stage>,
) -> StageReport {
    let record = state.stages.get(&stage).cloned().unwrap_or_default();
    StageReport {
        stage,
        status: record.status,
        top,
        artifacts: record.artifacts,
        failure: record.failure,
        newly_stale,
    }
}
