use std::{collections::HashMap, fmt, path::PathBuf};

use serde::Deserialize;

use super::Sample;
use crate::{
    config::{substitute_variables, unresolved_variable},
    workflow::StageDescriptor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    MissingTemplate(String),
    UnresolvedVariable(String),
    Invalid(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::MissingTemplate(stage) => {
                write!(f, "no command template for stage '{}'", stage)
            }
            CommandError::UnresolvedVariable(name) => {
                write!(f, "variable '{}' is not defined", name)
            }
            CommandError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CommandError {}

/// What a stage runs, plus paths it leaves behind for the final cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub command: String,
    pub temp_paths: Vec<PathBuf>,
}

impl StageCommand {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            temp_paths: Vec::new(),
        }
    }

    pub fn with_temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_paths.push(path.into());
        self
    }
}

/// Produces the command line of each stage.
pub trait CommandSource {
    fn sample_command(
        &self,
        stage: &StageDescriptor,
        sample: &Sample,
    ) -> Result<StageCommand, CommandError>;

    fn cohort_command(
        &self,
        stage: &StageDescriptor,
        samples: &[Sample],
    ) -> Result<StageCommand, CommandError>;
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StageTemplate {
    pub command: String,
    #[serde(default)]
    pub temp_paths: Vec<String>,
}

/// Renders stage commands from `${var}` templates.
///
/// Besides the global variables, a template sees `stage` and `title`, and either
/// `sample` plus the sample's own variables or `samples` (space separated ids) for
/// cohort stages. A braced variable that stays unresolved is an error; plain `$VAR`
/// references are left for the shell.
#[derive(Debug, Clone, Default)]
pub struct TemplateCommandSource {
    variables: HashMap<String, String>,
    templates: HashMap<String, StageTemplate>,
}

impl TemplateCommandSource {
    pub fn new(
        variables: HashMap<String, String>,
        templates: HashMap<String, StageTemplate>,
    ) -> Self {
        Self {
            variables,
            templates,
        }
    }

    pub fn with_template(mut self, stage: &str, command: &str) -> Self {
        self.templates.insert(
            stage.to_string(),
            StageTemplate {
                command: command.to_string(),
                temp_paths: Vec::new(),
            },
        );
        self
    }

    pub fn has_template(&self, stage: &str) -> bool {
        self.templates.contains_key(stage)
    }

    fn render(
        &self,
        stage: &StageDescriptor,
        scoped: Vec<(&str, String)>,
    ) -> Result<StageCommand, CommandError> {
        let template = self
            .templates
            .get(&stage.id)
            .ok_or_else(|| CommandError::MissingTemplate(stage.id.clone()))?;

        let mut variables = self.variables.clone();
        variables.insert("stage".to_string(), stage.id.clone());
        variables.insert("title".to_string(), stage.title.clone());
        for (key, value) in scoped {
            variables.insert(key.to_string(), value);
        }

        let command = render_text(&template.command, &variables)?;
        if command.trim().is_empty() {
            return Err(CommandError::Invalid(format!(
                "command template for stage '{}' is empty",
                stage.id
            )));
        }

        let temp_paths = template
            .temp_paths
            .iter()
            .map(|path| render_text(path, &variables).map(PathBuf::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StageCommand {
            command: command.trim().to_string(),
            temp_paths,
        })
    }
}

fn render_text(text: &str, variables: &HashMap<String, String>) -> Result<String, CommandError> {
    let rendered = substitute_variables(text, variables);
    match unresolved_variable(&rendered) {
        Some(name) => Err(CommandError::UnresolvedVariable(name)),
        None => Ok(rendered),
    }
}

impl CommandSource for TemplateCommandSource {
    fn sample_command(
        &self,
        stage: &StageDescriptor,
        sample: &Sample,
    ) -> Result<StageCommand, CommandError> {
        let mut scoped: Vec<(&str, String)> = sample
            .variables
            .iter()
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();
        scoped.push(("sample", sample.id.clone()));
        self.render(stage, scoped)
    }

    fn cohort_command(
        &self,
        stage: &StageDescriptor,
        samples: &[Sample],
    ) -> Result<StageCommand, CommandError> {
        let ids: Vec<&str> = samples.iter().map(|sample| sample.id.as_str()).collect();
        self.render(stage, vec![("samples", ids.join(" "))])
    }
}
