mod common;

use pipegen::{
    PipegenError, WorkflowKind,
    workflow::{StageRole, classify_stages, select_stages},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// A random toolset for `kind` that always carries the required stages and never
/// two conflicting ones, in shuffled-ish order.
fn random_toolset(kind: WorkflowKind, rng: &mut StdRng) -> Vec<String> {
    let definition = kind.definition();
    let mut toolset: Vec<String> = Vec::new();

    for stage in definition.stages() {
        if !stage.required && !rng.random_bool(0.4) {
            continue;
        }
        let conflicts = toolset.iter().any(|chosen| {
            stage.conflicts_with.contains(chosen)
                || definition
                    .stage(chosen)
                    .is_some_and(|other| other.conflicts_with.contains(&stage.id))
        });
        if !conflicts {
            toolset.push(stage.id.clone());
        }
    }

    toolset.reverse();
    toolset
}

#[test]
fn random_toolsets_select_canonical_subsequence() {
    common::setup_tracing();
    let mut rng = StdRng::seed_from_u64(42);

    for kind in WorkflowKind::ALL {
        let definition = kind.definition();
        for _ in 0..50 {
            let toolset = random_toolset(kind, &mut rng);
            let selected = select_stages(definition, &toolset).unwrap();

            let canonical: Vec<&str> = definition
                .stages()
                .iter()
                .filter(|stage| toolset.contains(&stage.id))
                .map(|stage| stage.id.as_str())
                .collect();
            let ids: Vec<&str> = selected.iter().map(|stage| stage.id.as_str()).collect();
            assert_eq!(ids, canonical, "{} with {:?}", kind, toolset);

            for stage in definition.stages().iter().filter(|stage| stage.required) {
                assert!(ids.contains(&stage.id.as_str()));
            }
        }
    }
}

#[test]
fn secondary_iff_fed_by_earlier_selected_sample_stage() {
    let mut rng = StdRng::seed_from_u64(7);

    for kind in WorkflowKind::ALL {
        for _ in 0..50 {
            let toolset = random_toolset(kind, &mut rng);
            let selected = select_stages(kind.definition(), &toolset).unwrap();
            let classified = classify_stages(&selected);

            for (index, stage) in classified.iter().enumerate() {
                let fed = classified[..index].iter().any(|earlier| {
                    earlier.role != StageRole::Cohort && earlier.descriptor.feeds(stage.id())
                });
                let expected = if stage.descriptor.is_cohort() {
                    StageRole::Cohort
                } else if fed {
                    StageRole::Secondary
                } else {
                    StageRole::Primary
                };
                assert_eq!(stage.role, expected, "{} stage {}", kind, stage.id());
            }
        }
    }
}

#[test]
fn dna_chain_through_post_alignment_is_secondary() {
    let selected = select_stages(
        WorkflowKind::DnaWgsVarFastq.definition(),
        &["trimmomatic", "bwa", "rmdup", "mutect2", "qcsummary"],
    )
    .unwrap();
    let roles: Vec<(&str, StageRole)> = classify_stages(&selected)
        .iter()
        .map(|stage| (stage.descriptor.id.as_str(), stage.role))
        .collect();

    assert_eq!(
        roles,
        [
            ("trimmomatic", StageRole::Primary),
            ("bwa", StageRole::Secondary),
            ("rmdup", StageRole::Secondary),
            ("mutect2", StageRole::Secondary),
            ("qcsummary", StageRole::Cohort),
        ]
    );
}

#[test]
fn required_stage_error_names_workflow_and_stage() {
    let err = select_stages(
        WorkflowKind::ScRnaExpressionCellRangerFastq.definition(),
        &["vdj"],
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, PipegenError::MissingRequiredStage { .. }));
    assert!(message.contains("scRnaExpression_CellRanger_Fastq"));
    assert!(message.contains("'count'"));
}

#[test]
fn unknown_workflow_name_is_rejected() {
    let err = "DnaWgsVar_Cram".parse::<WorkflowKind>().unwrap_err();
    assert!(matches!(err, PipegenError::UnknownWorkflow(name) if name == "DnaWgsVar_Cram"));
}
