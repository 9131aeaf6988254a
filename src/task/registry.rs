use std::collections::HashSet;

use tracing::debug;

use super::Task;
use crate::error::{PipegenError, Result};

/// Every task generated during one build, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    names: HashSet<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Task) -> Result<&Task> {
        if !self.names.insert(task.name.clone()) {
            return Err(PipegenError::DuplicateTask(task.name));
        }

        debug!("Registered task '{}'", task.name);
        let position = self.tasks.len();
        self.tasks.push(task);
        Ok(&self.tasks[position])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn for_sample<'a>(&'a self, sample: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |task| task.sample.as_deref() == Some(sample))
    }
}
