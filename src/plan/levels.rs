use std::collections::HashMap;

use crate::workflow::StageDescriptor;

/// Cohort stages grouped into execution levels. A level only starts after the
/// previous one completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLevel {
    pub level: usize,
    pub scripts: Vec<String>,
}

/// Level of every cohort stage: 0 when no other selected cohort stage feeds it,
/// otherwise one more than the deepest stage that does.
pub fn cohort_levels(stages: &[&StageDescriptor]) -> HashMap<String, usize> {
    let stage_map: HashMap<&str, &StageDescriptor> =
        stages.iter().map(|s| (s.id.as_str(), *s)).collect();
    let mut levels: HashMap<String, usize> = HashMap::new();

    for stage in stages {
        calculate_stage_level(&stage.id, &stage_map, &mut levels);
    }

    levels
}

fn calculate_stage_level(
    stage_id: &str,
    stage_map: &HashMap<&str, &StageDescriptor>,
    levels: &mut HashMap<String, usize>,
) -> usize {
    if let Some(&level) = levels.get(stage_id) {
        return level;
    }

    // Definitions only produce forward, so this recursion terminates.
    let producers: Vec<&str> = stage_map
        .values()
        .filter(|candidate| candidate.feeds(stage_id))
        .map(|candidate| candidate.id.as_str())
        .collect();

    let level = producers
        .into_iter()
        .map(|producer| calculate_stage_level(producer, stage_map, levels) + 1)
        .max()
        .unwrap_or(0);

    levels.insert(stage_id.to_string(), level);
    level
}

/// Groups `(script, level)` pairs into ascending levels, keeping insertion order inside a level.
pub fn group_by_level<I>(scripts: I) -> Vec<ExecutionLevel>
where
    I: IntoIterator<Item = (String, usize)>,
{
    let mut level_groups: Vec<ExecutionLevel> = Vec::new();

    for (script, level) in scripts {
        match level_groups.iter_mut().find(|group| group.level == level) {
            Some(group) => group.scripts.push(script),
            None => level_groups.push(ExecutionLevel {
                level,
                scripts: vec![script],
            }),
        }
    }

    level_groups.sort_by_key(|group| group.level);
    level_groups
}
