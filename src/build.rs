use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::{BuildConfig, ExecutionMode},
    error::{PipegenError, Result},
    manifest::{Manifest, load_manifest, save_manifest},
    plan::{MasterPlan, PlanBuilder},
    queue::QueueAdapter,
    script::{MasterScriptBuilder, stage_script},
    task::{CommandSource, LOG_DIR, SCRIPT_DIR, Task, TaskRegistry},
    workflow::{SelectedStage, StageRole, WorkflowKind, classify_stages, select_stages},
};

pub const MASTER_SCRIPT: &str = "master.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// A fully rendered build, held in memory until [`RenderedBuild::write`].
#[derive(Debug, Clone)]
pub struct RenderedBuild {
    pub workflow: WorkflowKind,
    pub output_dir: PathBuf,
    pub plan: MasterPlan,
    pub files: Vec<GeneratedFile>,
    pub master_path: Option<PathBuf>,
    /// Every task the build generated.
    pub registry: TaskRegistry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub unchanged: usize,
}

impl RenderedBuild {
    fn empty(config: &BuildConfig) -> Self {
        Self {
            workflow: config.workflow,
            output_dir: config.output_dir.clone(),
            plan: MasterPlan::default(),
            files: Vec::new(),
            master_path: None,
            registry: TaskRegistry::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, path: &Path) -> Option<&GeneratedFile> {
        self.files.iter().find(|file| file.path == path)
    }

    pub fn master_script(&self) -> Option<&str> {
        let path = self.master_path.as_deref()?;
        self.file(path).map(|file| file.contents.as_str())
    }

    /// Writes every file that changed since the last build and refreshes the manifest.
    pub fn write(&self) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        if self.files.is_empty() {
            info!("No stages selected, nothing written");
            return Ok(summary);
        }

        fs::create_dir_all(self.output_dir.join(SCRIPT_DIR))?;
        fs::create_dir_all(self.output_dir.join(LOG_DIR))?;

        let previous = load_manifest(&self.output_dir);
        let mut manifest = Manifest::new(self.workflow.name());

        for file in &self.files {
            if previous.is_current(&file.path, &file.contents) {
                debug!("Unchanged: {}", file.path.display());
                summary.unchanged += 1;
            } else {
                fs::write(&file.path, &file.contents)?;
                make_executable(&file.path)?;
                debug!("Wrote: {}", file.path.display());
                summary.written += 1;
            }
            manifest.record(&file.path, &file.contents);
        }

        for stale in previous.files.keys() {
            if !manifest.files.contains_key(stale) {
                debug!("No longer generated: {}", stale);
            }
        }

        save_manifest(&manifest, &self.output_dir)?;
        info!(
            "Generated {} scripts in {} ({} unchanged)",
            self.files.len(),
            self.output_dir.join(SCRIPT_DIR).display(),
            summary.unchanged
        );
        Ok(summary)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// State of one build. Created by the caller and consumed by [`BuildContext::render`].
pub struct BuildContext<'a> {
    config: &'a BuildConfig,
    registry: TaskRegistry,
    plan: PlanBuilder,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            registry: TaskRegistry::new(),
            plan: PlanBuilder::new(),
        }
    }

    /// Renders every script in memory. Nothing touches the filesystem here, so any
    /// error leaves the output directory as it was.
    pub fn render(mut self, source: &dyn CommandSource) -> Result<RenderedBuild> {
        let config = self.config;
        let workflow = config.workflow.name();
        let selected = select_stages(config.workflow.definition(), &config.toolset)?;
        let stages = classify_stages(&selected);

        if stages.is_empty() {
            info!("Workflow '{}' has no selected stages", workflow);
            return Ok(RenderedBuild::empty(config));
        }
        if config.samples.is_empty() {
            warn!("No samples configured for workflow '{}'", workflow);
        }

        let (cohort_stages, sample_stages): (Vec<SelectedStage>, Vec<SelectedStage>) = stages
            .into_iter()
            .partition(|stage| stage.role == StageRole::Cohort);

        for sample in &config.samples {
            for stage in &sample_stages {
                let command = source.sample_command(stage.descriptor, sample).map_err(|source| {
                    PipegenError::Command {
                        workflow: workflow.to_string(),
                        stage: stage.id().to_string(),
                        sample: Some(sample.id.clone()),
                        source,
                    }
                })?;
                let task = Task::new(workflow, stage, Some(&sample.id), &config.output_dir, command);
                let task = self.registry.register(task)?;
                let script = invocation(task, config.mode);

                if stage.role == StageRole::Secondary {
                    self.plan.add_secondary(&sample.id, &script)?;
                } else {
                    self.plan.add_primary(&sample.id, &script)?;
                }
                for target in &task.temp_paths {
                    self.plan.add_cleanup(&target.to_string_lossy());
                }
            }
        }

        for stage in &cohort_stages {
            let command = source
                .cohort_command(stage.descriptor, &config.samples)
                .map_err(|source| PipegenError::Command {
                    workflow: workflow.to_string(),
                    stage: stage.id().to_string(),
                    sample: None,
                    source,
                })?;
            let task = Task::new(workflow, stage, None, &config.output_dir, command);
            let task = self.registry.register(task)?;

            self.plan.add_cohort(&invocation(task, config.mode), stage.level)?;
            for target in &task.temp_paths {
                self.plan.add_cleanup(&target.to_string_lossy());
            }
        }

        let plan = self.plan.build()?;
        let mut files: Vec<GeneratedFile> = self
            .registry
            .tasks()
            .iter()
            .map(|task| GeneratedFile {
                path: task.script_path.clone(),
                contents: stage_script(task).render(config.line_ending),
            })
            .collect();

        if config.mode == ExecutionMode::Cluster {
            files.extend(wrappers(config, &self.registry, &plan));
        }

        let master = MasterScriptBuilder::new(&plan)
            .header(format!("Master script for workflow {}", workflow))
            .header(format!("Execution mode: {}", config.mode))
            .build()?;
        let master_path = config.output_dir.join(SCRIPT_DIR).join(MASTER_SCRIPT);
        files.push(GeneratedFile {
            path: master_path.clone(),
            contents: master.render(config.line_ending),
        });

        debug!(
            "Rendered {} tasks for {} samples",
            self.registry.len(),
            plan.per_sample.len()
        );

        Ok(RenderedBuild {
            workflow: config.workflow,
            output_dir: config.output_dir.clone(),
            plan,
            files,
            master_path: Some(master_path),
            registry: self.registry,
        })
    }
}

fn wrappers(config: &BuildConfig, registry: &TaskRegistry, plan: &MasterPlan) -> Vec<GeneratedFile> {
    let adapter = QueueAdapter::new(&config.queue);
    let mut unpolled = Vec::new();

    let wrappers = registry
        .tasks()
        .iter()
        .map(|task| {
            let prerequisite = is_prerequisite(plan, registry, task);
            if prerequisite && !config.queue.polling_enabled() {
                unpolled.push(task.name.as_str());
            }
            GeneratedFile {
                path: task.submit_path(),
                contents: adapter.wrap(task, prerequisite).render(config.line_ending),
            }
        })
        .collect();

    if !unpolled.is_empty() {
        warn!(
            "Cluster mode without status_check_period: ordering after {} submitted tasks \
             (e.g. '{}') is not enforced",
            unpolled.len(),
            unpolled[0]
        );
    }

    wrappers
}

/// Convenience wrapper that renders one build with a fresh context.
pub fn build(config: &BuildConfig, source: &dyn CommandSource) -> Result<RenderedBuild> {
    BuildContext::new(config).render(source)
}

fn invocation(task: &Task, mode: ExecutionMode) -> String {
    let path = match mode {
        ExecutionMode::Local => task.script_path.clone(),
        ExecutionMode::Cluster => task.submit_path(),
    };
    path.to_string_lossy().into_owned()
}

/// Whether something later in the master script depends on `task` finishing:
/// it is chained before another script, or a barrier with later work follows it.
fn is_prerequisite(plan: &MasterPlan, registry: &TaskRegistry, task: &Task) -> bool {
    match &task.sample {
        Some(sample_id) => {
            if plan.has_work_after_barrier() {
                return true;
            }
            // A sample's chain ends with its last secondary.
            registry
                .for_sample(sample_id)
                .filter(|other| other.role == StageRole::Secondary)
                .last()
                .is_some_and(|last| last.name != task.name)
        }
        None => {
            !plan.cleanup_targets.is_empty()
                || registry
                    .tasks()
                    .iter()
                    .any(|other| other.is_cohort() && other.level > task.level)
        }
    }
}
