use super::{JOBS_VAR, STATUS_VAR, Script, Stmt, quote};
use crate::{
    error::Result,
    plan::{MasterPlan, SampleScripts},
};

pub const CLEANUP_STEP: &str = "echo $(date) Begin Step: Remove temporary directories...";

/// Renders a [`MasterPlan`] into the master control script.
pub struct MasterScriptBuilder<'a> {
    plan: &'a MasterPlan,
    header: Vec<String>,
}

impl<'a> MasterScriptBuilder<'a> {
    pub fn new(plan: &'a MasterPlan) -> Self {
        Self {
            plan,
            header: Vec::new(),
        }
    }

    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.header.push(line.into());
        self
    }

    /// Every background unit is tracked and every barrier waits on each one, so
    /// the script exits 1 when any unit failed and 0 otherwise.
    pub fn build(&self) -> Result<Script> {
        self.plan.validate()?;

        let mut script = Script::bash();
        script.extend(self.header.iter().map(Stmt::comment));

        let samples: Vec<(&str, Vec<Stmt>)> = self
            .plan
            .per_sample
            .iter()
            .map(|sample| (sample.sample_id.as_str(), sample_units(sample)))
            .filter(|(_, units)| !units.is_empty())
            .collect();
        let tracking = !samples.is_empty() || !self.plan.post_processing.is_empty();
        if tracking {
            script.push(Stmt::assign(STATUS_VAR, "0"));
            script.push(Stmt::assign(JOBS_VAR, "()"));
        }

        for (sample_id, units) in &samples {
            script.push(Stmt::Empty);
            script.push(Stmt::comment(format!("sample {}", sample_id)));
            for unit in units {
                script.push(unit.clone());
                script.push(Stmt::TrackJob);
            }
        }

        if !samples.is_empty() {
            script.push(Stmt::WaitJobs);
        }

        for level in &self.plan.post_processing {
            script.push(Stmt::Empty);
            script.push(Stmt::comment(format!("post-processing level {}", level.level)));
            for path in &level.scripts {
                script.push(Stmt::invoke(path).background());
                script.push(Stmt::TrackJob);
            }
            script.push(Stmt::WaitJobs);
        }

        if !self.plan.cleanup_targets.is_empty() {
            script.push(Stmt::Empty);
            script.push(Stmt::command(CLEANUP_STEP));
            script.extend(
                self.plan
                    .cleanup_targets
                    .iter()
                    .map(|target| Stmt::command(format!("rm -rf {}", quote(target)))),
            );
        }

        if tracking {
            script.push(Stmt::ExitStatus);
        }

        Ok(script)
    }
}

/// Background units of one sample: one AND chain when it has secondaries,
/// otherwise every primary on its own.
fn sample_units(sample: &SampleScripts) -> Vec<Stmt> {
    if !sample.has_secondaries() {
        return sample
            .primary_scripts
            .iter()
            .map(|path| Stmt::invoke(path).background())
            .collect();
    }

    let chained = sample
        .primary_scripts
        .iter()
        .chain(&sample.secondary_scripts)
        .map(|path| Stmt::invoke(path));

    Stmt::and_chain(chained)
        .map(Stmt::background)
        .into_iter()
        .collect()
}
