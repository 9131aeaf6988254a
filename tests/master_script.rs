mod common;

use pipegen::{
    line_ending::LineEnding,
    plan::PlanBuilder,
    script::{MasterScriptBuilder, Stmt},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use common::{line_index, line_indices, setup_tracing, two_sample_plan};

fn barrier() -> String {
    Stmt::WaitJobs.to_string()
}

#[test]
fn two_sample_scenario_renders_in_dependency_order() {
    setup_tracing();
    let plan = two_sample_plan();
    let text = MasterScriptBuilder::new(&plan)
        .build()
        .unwrap()
        .render(LineEnding::Lf);

    let chain_a = line_index(&text, "align_A && quant_A &").unwrap();
    let unit_b = line_index(&text, "align_B &").unwrap();
    let waits = line_indices(&text, &barrier());
    let cohort = line_index(&text, "qc_cohort &").unwrap();
    let cleanup = line_index(&text, "rm -rf tmp/merged.fastq").unwrap();

    assert_eq!(waits.len(), 2);
    assert!(chain_a < waits[0] && unit_b < waits[0]);
    assert!(waits[0] < cohort && cohort < waits[1]);
    assert!(waits[1] < cleanup);
    assert_eq!(cleanup, text.lines().count() - 2);
    assert_eq!(text.lines().last(), Some("exit \"$status\""));
}

#[test]
fn rendering_is_idempotent() {
    let plan = two_sample_plan();
    let builder = MasterScriptBuilder::new(&plan).header("workflow test");
    let first = builder.build().unwrap().render(LineEnding::Crlf);
    let second = builder.build().unwrap().render(LineEnding::Crlf);
    assert_eq!(first, second);
    assert_eq!(first.matches("\r\n").count(), first.matches('\n').count());
}

#[test]
fn cohort_levels_are_separated_by_barriers() {
    let mut builder = PlanBuilder::new();
    builder.add_primary("A", "align_A").unwrap();
    builder.add_cohort("report", 1).unwrap();
    builder.add_cohort("merge", 0).unwrap();
    builder.add_cohort("qc", 0).unwrap();
    let plan = builder.build().unwrap();

    let text = MasterScriptBuilder::new(&plan)
        .build()
        .unwrap()
        .render(LineEnding::Lf);
    let waits = line_indices(&text, &barrier());
    let merge = line_index(&text, "merge &").unwrap();
    let qc = line_index(&text, "qc &").unwrap();
    let report = line_index(&text, "report &").unwrap();

    assert_eq!(waits.len(), 3);
    assert!(waits[0] < merge && waits[0] < qc);
    assert!(merge < waits[1] && qc < waits[1]);
    assert!(waits[1] < report && report < waits[2]);
}

/// Random plans: every primary-only sample fans out, every sample with secondaries
/// becomes exactly one chain, and nothing after the barrier precedes it.
#[test]
fn random_plans_keep_chain_and_barrier_structure() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..200 {
        let mut builder = PlanBuilder::new();
        let sample_count = rng.random_range(1..5);
        let mut expected_units = Vec::new();

        for sample in 0..sample_count {
            let id = format!("s{}", sample);
            let primaries: Vec<String> = (0..rng.random_range(1..4))
                .map(|i| format!("p{}_{}", i, id))
                .collect();
            let secondaries: Vec<String> = if rng.random_bool(0.5) {
                (0..rng.random_range(1..3))
                    .map(|i| format!("q{}_{}", i, id))
                    .collect()
            } else {
                Vec::new()
            };

            for script in &primaries {
                builder.add_primary(&id, script).unwrap();
            }
            for script in &secondaries {
                builder.add_secondary(&id, script).unwrap();
            }

            if secondaries.is_empty() {
                expected_units.extend(primaries.iter().map(|p| format!("{} &", p)));
            } else {
                let chain = Stmt::and_chain(
                    primaries
                        .iter()
                        .chain(&secondaries)
                        .map(|script| Stmt::invoke(script)),
                )
                .unwrap();
                expected_units.push(chain.background().to_string());
            }
        }

        let with_cohort = rng.random_bool(0.5);
        if with_cohort {
            builder.add_cohort("cohort_step", 0).unwrap();
        }
        builder.add_cleanup("scratch");

        let plan = builder.build().unwrap();
        let text = MasterScriptBuilder::new(&plan)
            .build()
            .unwrap()
            .render(LineEnding::Lf);
        let barrier = line_index(&text, &barrier()).unwrap();

        for unit in &expected_units {
            let position = line_index(&text, unit)
                .unwrap_or_else(|| panic!("missing unit '{}' in\n{}", unit, text));
            assert!(position < barrier);
        }
        let launched = text.lines().filter(|line| line.ends_with(" &")).count();
        assert_eq!(launched, expected_units.len() + usize::from(with_cohort));

        if with_cohort {
            assert!(line_index(&text, "cohort_step &").unwrap() > barrier);
        }
        assert!(line_index(&text, "rm -rf scratch").unwrap() > barrier);
    }
}
