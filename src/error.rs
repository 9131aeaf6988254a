use std::fmt;

use crate::{task::source::CommandError, util::LaunchError};

#[derive(Debug)]
pub enum PipegenError {
    UnknownWorkflow(String),
    UnknownStage {
        workflow: String,
        stage: String,
    },
    MissingRequiredStage {
        workflow: String,
        stage: String,
    },
    StageConflict {
        workflow: String,
        stage: String,
        other: String,
    },
    Definition(String),
    Plan(String),
    DuplicateTask(String),
    Config(String),
    Command {
        workflow: String,
        stage: String,
        sample: Option<String>,
        source: CommandError,
    },
    Launch(LaunchError),
    Io(std::io::Error),
    Parse(String),
    Json(serde_json::Error),
}

impl fmt::Display for PipegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipegenError::UnknownWorkflow(name) => {
                write!(f, "Configuration error: unsupported workflow '{}'", name)
            }
            PipegenError::UnknownStage { workflow, stage } => write!(
                f,
                "Configuration error: workflow '{}' has no stage '{}'",
                workflow, stage
            ),
            PipegenError::MissingRequiredStage { workflow, stage } => write!(
                f,
                "Configuration error: workflow '{}' requires stage '{}' in the toolset",
                workflow, stage
            ),
            PipegenError::StageConflict {
                workflow,
                stage,
                other,
            } => write!(
                f,
                "Configuration error: stage '{}' is not compatible with '{}' in workflow '{}'",
                stage, other, workflow
            ),
            PipegenError::Definition(msg) => write!(f, "Pipeline definition error: {}", msg),
            PipegenError::Plan(msg) => write!(f, "Plan error: {}", msg),
            PipegenError::DuplicateTask(name) => {
                write!(f, "Task error: task '{}' was registered twice", name)
            }
            PipegenError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipegenError::Command {
                workflow,
                stage,
                sample,
                source,
            } => match sample {
                Some(sample) => write!(
                    f,
                    "Command error in workflow '{}', stage '{}', sample '{}': {}",
                    workflow, stage, sample, source
                ),
                None => write!(
                    f,
                    "Command error in workflow '{}', cohort stage '{}': {}",
                    workflow, stage, source
                ),
            },
            PipegenError::Launch(err) => write!(f, "Launch error: {}", err),
            PipegenError::Io(err) => write!(f, "IO error: {}", err),
            PipegenError::Parse(msg) => write!(f, "Parse error: {}", msg),
            PipegenError::Json(err) => write!(f, "Manifest error: {}", err),
        }
    }
}

impl std::error::Error for PipegenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipegenError::Io(err) => Some(err),
            PipegenError::Json(err) => Some(err),
            PipegenError::Launch(err) => Some(err),
            PipegenError::Command { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipegenError {
    fn from(err: std::io::Error) -> Self {
        PipegenError::Io(err)
    }
}

impl From<LaunchError> for PipegenError {
    fn from(err: LaunchError) -> Self {
        PipegenError::Launch(err)
    }
}

impl From<toml::de::Error> for PipegenError {
    fn from(err: toml::de::Error) -> Self {
        PipegenError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for PipegenError {
    fn from(err: serde_json::Error) -> Self {
        PipegenError::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, PipegenError>;
