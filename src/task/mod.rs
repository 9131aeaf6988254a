pub mod registry;
pub mod source;

pub use registry::TaskRegistry;
pub use source::{CommandError, CommandSource, StageCommand, TemplateCommandSource};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::workflow::{SelectedStage, StageRole};

pub const SCRIPT_DIR: &str = "sh_files";
pub const LOG_DIR: &str = "log_files";

/// A sample as given in the configuration, with the variables its command templates may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: String,
    pub variables: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }
}

/// One generated stage script, for one sample or for the cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub stage: String,
    /// `None` for cohort tasks.
    pub sample: Option<String>,
    pub role: StageRole,
    /// Cohort execution level, 0 for per-sample tasks.
    pub level: usize,
    pub title: String,
    pub command: String,
    pub script_path: PathBuf,
    pub log_path: PathBuf,
    pub err_path: PathBuf,
    pub temp_paths: Vec<PathBuf>,
}

impl Task {
    pub fn new(
        workflow: &str,
        stage: &SelectedStage<'_>,
        sample: Option<&str>,
        output_dir: &Path,
        command: StageCommand,
    ) -> Self {
        let name = task_name(workflow, stage.id(), sample);
        let log_dir = output_dir.join(LOG_DIR);

        Self {
            script_path: output_dir.join(SCRIPT_DIR).join(format!("{}.sh", name)),
            log_path: log_dir.join(format!("{}.log", name)),
            err_path: log_dir.join(format!("{}.err", name)),
            stage: stage.id().to_string(),
            sample: sample.map(str::to_string),
            role: stage.role,
            level: stage.level,
            title: stage.descriptor.title.clone(),
            command: command.command,
            temp_paths: command.temp_paths,
            name,
        }
    }

    pub fn is_cohort(&self) -> bool {
        self.sample.is_none()
    }

    /// Path of the queue submission wrapper used in cluster mode.
    pub fn submit_path(&self) -> PathBuf {
        self.script_path
            .with_file_name(format!("{}_submit.sh", self.name))
    }
}

pub fn task_name(workflow: &str, stage: &str, sample: Option<&str>) -> String {
    match sample {
        Some(sample) => format!("{}_{}_for_{}_analysis", workflow, stage, sample),
        None => format!("{}_{}_for_cohort_analysis", workflow, stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StageDescriptor;

    #[test]
    fn sample_task_paths_follow_naming_scheme() {
        let descriptor = StageDescriptor::sample("star", "STAR alignment");
        let stage = SelectedStage {
            descriptor: &descriptor,
            role: StageRole::Primary,
            level: 0,
        };
        let task = Task::new(
            "RnaExpression_Fastq",
            &stage,
            Some("A"),
            Path::new("/data/out"),
            StageCommand::new("STAR --runMode alignReads"),
        );

        assert_eq!(task.name, "RnaExpression_Fastq_star_for_A_analysis");
        assert_eq!(
            task.script_path,
            Path::new("/data/out/sh_files/RnaExpression_Fastq_star_for_A_analysis.sh")
        );
        assert_eq!(
            task.log_path,
            Path::new("/data/out/log_files/RnaExpression_Fastq_star_for_A_analysis.log")
        );
        assert_eq!(
            task.submit_path(),
            Path::new("/data/out/sh_files/RnaExpression_Fastq_star_for_A_analysis_submit.sh")
        );
    }

    #[test]
    fn cohort_task_name_has_no_sample() {
        assert_eq!(
            task_name("DnaWgsVar_Bam", "mergeMutation", None),
            "DnaWgsVar_Bam_mergeMutation_for_cohort_analysis"
        );
    }
}
