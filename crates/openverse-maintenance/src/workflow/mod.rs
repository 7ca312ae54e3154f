//! Workflow definitions: named steps with dependencies, retries and timeouts.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::{MaintenanceError, Result};

mod runner;
mod validator;

pub use runner::{
    StepContext, StepHandler, StepHandlers, StepOutcome, StepStatus, WorkflowRunReport,
    WorkflowRunner,
};
pub use validator::{Severity, ValidationFinding, ValidationReport};

/// A single unit of work in a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub name: String,
    /// Steps that must succeed before this one runs.
    pub dependencies: Vec<String>,
    /// Re-attempts after the first failure.
    pub retries: u32,
    #[serde(
        rename = "execution_timeout_seconds",
        serialize_with = "serialize_timeout"
    )]
    pub execution_timeout: Option<Duration>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            retries: 0,
            execution_timeout: None,
        }
    }

    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.dependencies.push(step.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

fn serialize_timeout<S: Serializer>(
    timeout: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match timeout {
        Some(t) => serializer.serialize_some(&t.as_secs()),
        None => serializer.serialize_none(),
    }
}

/// A manually triggered workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub description: String,
    /// Concurrent runs allowed per runner.
    pub max_active_runs: u32,
    pub tags: Vec<String>,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Structural checks over the step graph.
    pub fn validate(&self) -> ValidationReport {
        validator::validate(self)
    }

    /// Steps in dependency order, ties broken by declaration order.
    ///
    /// Fails with [`MaintenanceError::InvalidWorkflow`] when validation
    /// reports an error.
    pub fn execution_order(&self) -> Result<Vec<&StepDefinition>> {
        let report = self.validate();
        if !report.valid {
            return Err(MaintenanceError::InvalidWorkflow {
                workflow: self.id.clone(),
                findings: report.error_messages(),
            });
        }

        let mut placed: HashSet<&str> = HashSet::with_capacity(self.steps.len());
        let mut order = Vec::with_capacity(self.steps.len());

        while order.len() < self.steps.len() {
            let ready = self.steps.iter().find(|step| {
                !placed.contains(step.name.as_str())
                    && step.dependencies.iter().all(|d| placed.contains(d.as_str()))
            });
            match ready {
                Some(step) => {
                    placed.insert(step.name.as_str());
                    order.push(step);
                }
                // Unreachable after a clean validation; kept as an error path.
                None => {
                    return Err(MaintenanceError::InvalidWorkflow {
                        workflow: self.id.clone(),
                        findings: vec!["no step is ready to run".to_string()],
                    })
                }
            }
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(steps: Vec<StepDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "test_workflow".into(),
            description: String::new(),
            max_active_runs: 1,
            tags: vec![],
            steps,
        }
    }

    #[test]
    fn test_execution_order_follows_dependencies() {
        let workflow = definition(vec![
            StepDefinition::new("load").depends_on("fetch"),
            StepDefinition::new("fetch"),
            StepDefinition::new("report").depends_on("load"),
        ]);
        let order: Vec<&str> = workflow
            .execution_order()
            .unwrap()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(order, vec!["fetch", "load", "report"]);
    }

    #[test]
    fn test_execution_order_declaration_ties() {
        let workflow = definition(vec![
            StepDefinition::new("b"),
            StepDefinition::new("a"),
            StepDefinition::new("c").depends_on("a").depends_on("b"),
        ]);
        let order: Vec<&str> = workflow
            .execution_order()
            .unwrap()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_execution_order_rejects_cycles() {
        let workflow = definition(vec![
            StepDefinition::new("a").depends_on("b"),
            StepDefinition::new("b").depends_on("a"),
        ]);
        let err = workflow.execution_order().unwrap_err();
        assert!(matches!(err, MaintenanceError::InvalidWorkflow { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_step_serializes_timeout_seconds() {
        let step = StepDefinition::new("trigger")
            .depends_on("install")
            .with_timeout(Duration::from_secs(18_000));
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["execution_timeout_seconds"], 18_000);
        assert_eq!(json["retries"], 0);
        assert_eq!(json["dependencies"][0], "install");
    }
}
