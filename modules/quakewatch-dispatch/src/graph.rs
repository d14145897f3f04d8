//! Prerequisite graph for task identities.

use std::collections::HashMap;

use quakewatch_common::{AudienceKind, TaskIdentity};

/// One prerequisite: a task, optionally scoped to an audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub task: TaskIdentity,
    pub audience: Option<AudienceKind>,
}

impl Step {
    pub fn task(task: TaskIdentity) -> Self {
        Self {
            task,
            audience: None,
        }
    }

    pub fn for_audience(task: TaskIdentity, audience: AudienceKind) -> Self {
        Self {
            task,
            audience: Some(audience),
        }
    }
}

/// Task identity -> ordered prerequisite steps. Tasks with no entry are simple.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    prerequisites: HashMap<TaskIdentity, Vec<Step>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prerequisites(mut self, task: TaskIdentity, steps: Vec<Step>) -> Self {
        self.prerequisites.insert(task, steps);
        self
    }

    /// Alert needs the latest event and citizens; Report also needs news and
    /// addresses organizations.
    pub fn standard() -> Self {
        Self::new()
            .with_prerequisites(
                TaskIdentity::Alert,
                vec![
                    Step::task(TaskIdentity::DataFetch),
                    Step::for_audience(TaskIdentity::RecipientQuery, AudienceKind::Citizen),
                ],
            )
            .with_prerequisites(
                TaskIdentity::Report,
                vec![
                    Step::task(TaskIdentity::DataFetch),
                    Step::task(TaskIdentity::NewsFetch),
                    Step::for_audience(TaskIdentity::RecipientQuery, AudienceKind::Organization),
                ],
            )
    }

    pub fn prerequisites(&self, task: TaskIdentity) -> &[Step] {
        self.prerequisites
            .get(&task)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_composite(&self, task: TaskIdentity) -> bool {
        !self.prerequisites(task).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_graph_orders_prerequisites() {
        let graph = TaskGraph::standard();
        let report: Vec<TaskIdentity> = graph
            .prerequisites(TaskIdentity::Report)
            .iter()
            .map(|s| s.task)
            .collect();
        assert_eq!(
            report,
            vec![
                TaskIdentity::DataFetch,
                TaskIdentity::NewsFetch,
                TaskIdentity::RecipientQuery
            ]
        );
        assert_eq!(
            graph.prerequisites(TaskIdentity::Alert)[1],
            Step::for_audience(TaskIdentity::RecipientQuery, AudienceKind::Citizen)
        );
    }

    #[test]
    fn leaf_tasks_are_simple() {
        let graph = TaskGraph::standard();
        for task in [
            TaskIdentity::DataFetch,
            TaskIdentity::NewsFetch,
            TaskIdentity::RecipientQuery,
        ] {
            assert!(!graph.is_composite(task));
            assert!(graph.prerequisites(task).is_empty());
        }
        assert!(graph.is_composite(TaskIdentity::Alert));
    }
}
