// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::LazyLock;

use pipegen::{
    plan::{MasterPlan, PlanBuilder},
    task::TemplateCommandSource,
    workflow::PipelineDefinition,
};
use tracing::Level;

static TRACING_INIT: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
});

pub fn setup_tracing() {
    LazyLock::force(&TRACING_INIT);
}

/// Samples A and B, A with a secondary, one cohort script and one cleanup target.
pub fn two_sample_plan() -> MasterPlan {
    let mut builder = PlanBuilder::new();
    builder.add_primary("A", "align_A").unwrap();
    builder.add_secondary("A", "quant_A").unwrap();
    builder.add_primary("B", "align_B").unwrap();
    builder.add_cohort("qc_cohort", 0).unwrap();
    builder.add_cleanup("tmp/merged.fastq");
    builder.build().unwrap()
}

/// A command source with an `echo` template for every stage of `definition`.
pub fn echo_source(definition: &PipelineDefinition) -> TemplateCommandSource {
    definition
        .stages()
        .iter()
        .fold(TemplateCommandSource::default(), |source, stage| {
            source.with_template(&stage.id, "echo ${stage}")
        })
}

/// Index of the first line equal to `line`.
pub fn line_index(text: &str, line: &str) -> Option<usize> {
    text.lines().position(|candidate| candidate == line)
}

/// Indices of every line equal to `line`.
pub fn line_indices(text: &str, line: &str) -> Vec<usize> {
    text.lines()
        .enumerate()
        .filter(|(_, candidate)| *candidate == line)
        .map(|(index, _)| index)
        .collect()
}
