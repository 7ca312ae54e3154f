//! Workflow validation: duplicate names, dependency references and cycles.
//!
//! All checks are pure functions over the definition.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::WorkflowDefinition;

/// Severity level for a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationFinding {
    /// Machine-readable code (e.g., `DUPLICATE_STEP_NAME`).
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// Step name involved, if applicable.
    pub step: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// No error-level findings.
    pub valid: bool,
    pub findings: Vec<ValidationFinding>,
    pub step_count: usize,
    pub has_cycles: bool,
}

impl ValidationReport {
    pub fn has_code(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }

    pub(crate) fn error_messages(&self) -> Vec<String> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .map(|f| f.message.clone())
            .collect()
    }
}

pub(crate) fn validate(workflow: &WorkflowDefinition) -> ValidationReport {
    let mut findings = Vec::new();

    check_steps_present(workflow, &mut findings);
    check_max_active_runs(workflow, &mut findings);
    check_duplicate_step_names(workflow, &mut findings);
    check_dependencies(workflow, &mut findings);

    let cycle_findings = check_cycles(workflow);
    let has_cycles = !cycle_findings.is_empty();
    findings.extend(cycle_findings);

    let valid = !findings.iter().any(|f| f.severity == Severity::Error);

    ValidationReport {
        valid,
        findings,
        step_count: workflow.steps.len(),
        has_cycles,
    }
}

fn error(code: &str, message: String, step: Option<&str>) -> ValidationFinding {
    ValidationFinding {
        code: code.into(),
        severity: Severity::Error,
        message,
        step: step.map(str::to_string),
    }
}

fn check_steps_present(workflow: &WorkflowDefinition, findings: &mut Vec<ValidationFinding>) {
    if workflow.steps.is_empty() {
        findings.push(error(
            "NO_STEPS",
            format!("Workflow '{}' has no steps", workflow.id),
            None,
        ));
    }
}

fn check_max_active_runs(workflow: &WorkflowDefinition, findings: &mut Vec<ValidationFinding>) {
    if workflow.max_active_runs == 0 {
        findings.push(ValidationFinding {
            code: "ZERO_MAX_ACTIVE_RUNS".into(),
            severity: Severity::Warning,
            message: format!("Workflow '{}' allows no active runs", workflow.id),
            step: None,
        });
    }
}

fn check_duplicate_step_names(workflow: &WorkflowDefinition, findings: &mut Vec<ValidationFinding>) {
    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(&step.name) {
            findings.push(error(
                "DUPLICATE_STEP_NAME",
                format!("Duplicate step name: '{}'", step.name),
                Some(&step.name),
            ));
        }
    }
}

fn check_dependencies(workflow: &WorkflowDefinition, findings: &mut Vec<ValidationFinding>) {
    let step_names: HashSet<&str> = workflow.steps.iter().map(|s| s.name.as_str()).collect();

    for step in &workflow.steps {
        for dep in &step.dependencies {
            if dep == &step.name {
                findings.push(error(
                    "SELF_DEPENDENCY",
                    format!("Step '{}' depends on itself", step.name),
                    Some(&step.name),
                ));
            } else if !step_names.contains(dep.as_str()) {
                findings.push(error(
                    "MISSING_DEP_REF",
                    format!(
                        "Step '{}' depends on '{}' which does not exist",
                        step.name, dep
                    ),
                    Some(&step.name),
                ));
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS with white/gray/black coloring. Self-dependencies are reported by
/// [`check_dependencies`] and skipped here.
fn check_cycles(workflow: &WorkflowDefinition) -> Vec<ValidationFinding> {
    let adj: HashMap<&str, Vec<&str>> = workflow
        .steps
        .iter()
        .map(|s| {
            (
                s.name.as_str(),
                s.dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|d| *d != s.name)
                    .collect(),
            )
        })
        .collect();

    let mut colors: HashMap<&str, Color> =
        workflow.steps.iter().map(|s| (s.name.as_str(), Color::White)).collect();
    let mut findings = Vec::new();

    for step in &workflow.steps {
        if colors.get(step.name.as_str()) == Some(&Color::White) {
            let mut path = Vec::new();
            visit(step.name.as_str(), &adj, &mut colors, &mut path, &mut findings);
        }
    }

    findings
}

fn visit<'a>(
    node: &'a str,
    adj: &HashMap<&'a str, Vec<&'a str>>,
    colors: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
    findings: &mut Vec<ValidationFinding>,
) {
    colors.insert(node, Color::Gray);
    path.push(node);

    for &neighbor in adj.get(node).into_iter().flatten() {
        match colors.get(neighbor) {
            Some(Color::Gray) => {
                let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                findings.push(error(
                    "CYCLE_DETECTED",
                    format!(
                        "Dependency cycle detected: {} -> {}",
                        path[start..].join(" -> "),
                        neighbor
                    ),
                    Some(neighbor),
                ));
            }
            Some(Color::White) => visit(neighbor, adj, colors, path, findings),
            // Missing references are reported elsewhere
            Some(Color::Black) | None => {}
        }
    }

    path.pop();
    colors.insert(node, Color::Black);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepDefinition;

    fn definition(steps: Vec<StepDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "validation_test".into(),
            description: String::new(),
            max_active_runs: 1,
            tags: vec![],
            steps,
        }
    }

    #[test]
    fn test_valid_workflow_passes() {
        let report = validate(&definition(vec![
            StepDefinition::new("step_a"),
            StepDefinition::new("step_b").depends_on("step_a"),
        ]));
        assert!(report.valid);
        assert!(!report.has_cycles);
        assert_eq!(report.step_count, 2);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let report = validate(&definition(vec![
            StepDefinition::new("step_a").depends_on("step_c"),
            StepDefinition::new("step_b").depends_on("step_a"),
            StepDefinition::new("step_c").depends_on("step_b"),
        ]));
        assert!(!report.valid);
        assert!(report.has_cycles);
        let cycle = report
            .findings
            .iter()
            .find(|f| f.code == "CYCLE_DETECTED")
            .unwrap();
        assert!(cycle.message.contains("step_a -> step_c -> step_b -> step_a"));
    }

    #[test]
    fn test_missing_dep_ref() {
        let report = validate(&definition(vec![
            StepDefinition::new("step_a").depends_on("nonexistent_step")
        ]));
        assert!(!report.valid);
        assert!(report.has_code("MISSING_DEP_REF"));
        assert!(!report.has_cycles);
    }

    #[test]
    fn test_self_dependency() {
        let report = validate(&definition(vec![
            StepDefinition::new("step_a").depends_on("step_a")
        ]));
        assert!(!report.valid);
        assert!(report.has_code("SELF_DEPENDENCY"));
        assert!(!report.has_cycles);
    }

    #[test]
    fn test_duplicate_step_names() {
        let report = validate(&definition(vec![
            StepDefinition::new("step_a"),
            StepDefinition::new("step_a"),
        ]));
        assert!(!report.valid);
        let dupe = report
            .findings
            .iter()
            .find(|f| f.code == "DUPLICATE_STEP_NAME")
            .unwrap();
        assert_eq!(dupe.step.as_deref(), Some("step_a"));
    }

    #[test]
    fn test_empty_workflow() {
        let report = validate(&definition(vec![]));
        assert!(!report.valid);
        assert!(report.has_code("NO_STEPS"));
    }

    #[test]
    fn test_zero_max_active_runs_is_warning() {
        let mut workflow = definition(vec![StepDefinition::new("step_a")]);
        workflow.max_active_runs = 0;
        let report = validate(&workflow);
        assert!(report.valid);
        assert!(report
            .findings
            .iter()
            .any(|f| f.code == "ZERO_MAX_ACTIVE_RUNS" && f.severity == Severity::Warning));
    }
}
