pub mod levels;

pub use levels::{ExecutionLevel, cohort_levels, group_by_level};

use std::collections::{HashMap, HashSet};

use crate::error::{PipegenError, Result};

/// Invocations for one sample. Primaries complete before any secondary starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleScripts {
    pub sample_id: String,
    pub primary_scripts: Vec<String>,
    pub secondary_scripts: Vec<String>,
}

impl SampleScripts {
    pub fn new(sample_id: &str) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            primary_scripts: Vec::new(),
            secondary_scripts: Vec::new(),
        }
    }

    pub fn has_secondaries(&self) -> bool {
        !self.secondary_scripts.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterPlan {
    pub per_sample: Vec<SampleScripts>,
    pub post_processing: Vec<ExecutionLevel>,
    pub cleanup_targets: Vec<String>,
}

impl MasterPlan {
    pub fn validate(&self) -> Result<()> {
        for sample in &self.per_sample {
            if sample.has_secondaries() && sample.primary_scripts.is_empty() {
                return Err(PipegenError::Plan(format!(
                    "sample '{}' has secondary scripts but no primary script",
                    sample.sample_id
                )));
            }
        }
        Ok(())
    }

    /// True when the barrier after the per-sample units has work after it.
    pub fn has_work_after_barrier(&self) -> bool {
        !self.post_processing.is_empty() || !self.cleanup_targets.is_empty()
    }
}

/// Accumulates script invocations while tasks are generated.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    per_sample: Vec<SampleScripts>,
    sample_index: HashMap<String, usize>,
    cohort_scripts: Vec<(String, usize)>,
    cleanup_targets: Vec<String>,
    seen_targets: HashSet<String>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_primary(&mut self, sample_id: &str, script: &str) -> Result<()> {
        let script = checked_script(script, sample_id)?;
        let sample = self.sample_mut(sample_id);
        if !sample.primary_scripts.contains(&script) {
            sample.primary_scripts.push(script);
        }
        Ok(())
    }

    pub fn add_secondary(&mut self, sample_id: &str, script: &str) -> Result<()> {
        let script = checked_script(script, sample_id)?;
        let sample = self.sample_mut(sample_id);
        if !sample.secondary_scripts.contains(&script) {
            sample.secondary_scripts.push(script);
        }
        Ok(())
    }

    pub fn add_cohort(&mut self, script: &str, level: usize) -> Result<()> {
        let script = checked_script(script, "cohort")?;
        if !self.cohort_scripts.iter().any(|(existing, _)| existing == &script) {
            self.cohort_scripts.push((script, level));
        }
        Ok(())
    }

    pub fn add_cleanup(&mut self, target: &str) {
        let target = target.trim();
        if !target.is_empty() && self.seen_targets.insert(target.to_string()) {
            self.cleanup_targets.push(target.to_string());
        }
    }

    pub fn build(self) -> Result<MasterPlan> {
        let plan = MasterPlan {
            per_sample: self.per_sample,
            post_processing: group_by_level(self.cohort_scripts),
            cleanup_targets: self.cleanup_targets,
        };
        plan.validate()?;
        Ok(plan)
    }

    fn sample_mut(&mut self, sample_id: &str) -> &mut SampleScripts {
        let position = match self.sample_index.get(sample_id) {
            Some(&position) => position,
            None => {
                self.per_sample.push(SampleScripts::new(sample_id));
                let position = self.per_sample.len() - 1;
                self.sample_index.insert(sample_id.to_string(), position);
                position
            }
        };
        &mut self.per_sample[position]
    }
}

fn checked_script(script: &str, owner: &str) -> Result<String> {
    let script = script.trim();
    if script.is_empty() {
        return Err(PipegenError::Plan(format!(
            "blank script path for '{}'",
            owner
        )));
    }
    Ok(script.to_string())
}
