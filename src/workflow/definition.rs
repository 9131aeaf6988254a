use std::collections::HashMap;

use crate::error::{PipegenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageScope {
    /// Runs once for every sample.
    Sample,
    /// Runs once over the outputs of all samples, after the per-sample barrier.
    Cohort,
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub id: String,
    /// Human readable step name, used in generated log lines.
    pub title: String,
    pub required: bool,
    pub scope: StageScope,
    /// Stages that consume this stage's output. All of them appear later in the definition.
    pub produces_for: Vec<String>,
    pub conflicts_with: Vec<String>,
}

impl StageDescriptor {
    pub fn sample(id: &str, title: &str) -> Self {
        Self::new(id, title, StageScope::Sample)
    }

    pub fn cohort(id: &str, title: &str) -> Self {
        Self::new(id, title, StageScope::Cohort)
    }

    fn new(id: &str, title: &str, scope: StageScope) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            required: false,
            scope,
            produces_for: Vec::new(),
            conflicts_with: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn produces_for(mut self, ids: &[&str]) -> Self {
        for id in ids {
            if !self.produces_for.iter().any(|existing| existing == id) {
                self.produces_for.push(id.to_string());
            }
        }
        self
    }

    pub fn conflicts_with(mut self, ids: &[&str]) -> Self {
        self.conflicts_with.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn is_cohort(&self) -> bool {
        self.scope == StageScope::Cohort
    }

    pub fn feeds(&self, stage_id: &str) -> bool {
        self.produces_for.iter().any(|id| id == stage_id)
    }
}

/// The canonical, ordered stage list of one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,
    stages: Vec<StageDescriptor>,
}

impl PipelineDefinition {
    pub fn new(name: &str, stages: Vec<StageDescriptor>) -> Result<Self> {
        let definition = Self {
            name: name.to_string(),
            stages,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Catalog entries are checked by the catalog tests instead of at runtime.
    pub(crate) fn builtin(name: &str, stages: Vec<StageDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn stage(&self, id: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (index, stage) in self.stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(PipegenError::Definition(format!(
                    "workflow '{}' has a stage with an empty id at position {}",
                    self.name, index
                )));
            }
            if positions.insert(&stage.id, index).is_some() {
                return Err(PipegenError::Definition(format!(
                    "workflow '{}' defines stage '{}' more than once",
                    self.name, stage.id
                )));
            }
        }

        for (index, stage) in self.stages.iter().enumerate() {
            for target in &stage.produces_for {
                let target_index = match positions.get(target.as_str()) {
                    Some(&target_index) => target_index,
                    None => {
                        return Err(PipegenError::Definition(format!(
                            "stage '{}' of workflow '{}' produces for '{}' which doesn't exist",
                            stage.id, self.name, target
                        )));
                    }
                };

                if target_index <= index {
                    return Err(PipegenError::Definition(format!(
                        "stage '{}' of workflow '{}' produces for '{}' which is not ordered after it",
                        stage.id, self.name, target
                    )));
                }

                if stage.is_cohort() && !self.stages[target_index].is_cohort() {
                    return Err(PipegenError::Definition(format!(
                        "cohort stage '{}' of workflow '{}' cannot feed per-sample stage '{}'",
                        stage.id, self.name, target
                    )));
                }
            }

            for other in &stage.conflicts_with {
                if other == &stage.id || !positions.contains_key(other.as_str()) {
                    return Err(PipegenError::Definition(format!(
                        "stage '{}' of workflow '{}' declares an invalid conflict with '{}'",
                        stage.id, self.name, other
                    )));
                }
            }
        }

        Ok(())
    }
}
