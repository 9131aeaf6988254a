use std::collections::HashSet;

use tracing::debug;

use super::{PipelineDefinition, StageDescriptor};
use crate::{
    error::{PipegenError, Result},
    plan::levels::cohort_levels,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// Base analytic path of a sample; nothing selected before it feeds it.
    Primary,
    /// Consumes the output of an earlier selected stage of the same sample.
    Secondary,
    /// Post-processing over all samples.
    Cohort,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectedStage<'a> {
    pub descriptor: &'a StageDescriptor,
    pub role: StageRole,
    /// Execution level among cohort stages, always 0 for per-sample stages.
    pub level: usize,
}

impl SelectedStage<'_> {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Returns the stages of `definition` named in `toolset`, in the definition's canonical order.
pub fn select_stages<'a, S: AsRef<str>>(
    definition: &'a PipelineDefinition,
    toolset: &[S],
) -> Result<Vec<&'a StageDescriptor>> {
    let mut requested: HashSet<&str> = HashSet::new();

    for entry in toolset {
        let id = entry.as_ref().trim();
        if id.is_empty() {
            continue;
        }
        if definition.stage(id).is_none() {
            return Err(PipegenError::UnknownStage {
                workflow: definition.name().to_string(),
                stage: id.to_string(),
            });
        }
        requested.insert(id);
    }

    for stage in definition.stages() {
        if stage.required && !requested.contains(stage.id.as_str()) {
            return Err(PipegenError::MissingRequiredStage {
                workflow: definition.name().to_string(),
                stage: stage.id.clone(),
            });
        }
    }

    let selected: Vec<&StageDescriptor> = definition
        .stages()
        .iter()
        .filter(|stage| requested.contains(stage.id.as_str()))
        .collect();

    for stage in &selected {
        for other in &stage.conflicts_with {
            if requested.contains(other.as_str()) {
                return Err(PipegenError::StageConflict {
                    workflow: definition.name().to_string(),
                    stage: stage.id.clone(),
                    other: other.clone(),
                });
            }
        }
    }

    debug!(
        "Workflow '{}' selected stages: {}",
        definition.name(),
        selected
            .iter()
            .map(|stage| stage.id.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    Ok(selected)
}

/// Assigns each selected stage its role in the per-sample chain or cohort post-processing.
pub fn classify_stages<'a>(selected: &[&'a StageDescriptor]) -> Vec<SelectedStage<'a>> {
    let cohort: Vec<&StageDescriptor> = selected
        .iter()
        .copied()
        .filter(|stage| stage.is_cohort())
        .collect();
    let levels = cohort_levels(&cohort);

    selected
        .iter()
        .enumerate()
        .map(|(index, &descriptor)| {
            if descriptor.is_cohort() {
                return SelectedStage {
                    descriptor,
                    role: StageRole::Cohort,
                    level: levels.get(descriptor.id.as_str()).copied().unwrap_or(0),
                };
            }

            let fed = selected[..index]
                .iter()
                .any(|earlier| !earlier.is_cohort() && earlier.feeds(&descriptor.id));

            SelectedStage {
                descriptor,
                role: if fed {
                    StageRole::Secondary
                } else {
                    StageRole::Primary
                },
                level: 0,
            }
        })
        .collect()
}
