//! Sequential workflow runner.
//!
//! Steps run one at a time in [`WorkflowDefinition::execution_order`]. A step
//! whose dependency did not succeed is recorded as
//! [`StepStatus::UpstreamFailed`] and never started.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{StepDefinition, WorkflowDefinition};
use crate::{MaintenanceError, Result};

/// Per-attempt information handed to a step handler.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub step: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Work performed by one workflow step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Execute the step. The returned value is kept in the run report.
    async fn execute(&self, ctx: &StepContext) -> Result<Value>;
}

/// Handlers keyed by step name.
#[derive(Clone, Default)]
pub struct StepHandlers {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl std::fmt::Debug for StepHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("StepHandlers").field("steps", &names).finish()
    }
}

impl StepHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(step.into(), handler);
    }

    pub fn with(mut self, step: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        self.register(step, handler);
        self
    }

    pub fn get(&self, step: &str) -> Option<&Arc<dyn StepHandler>> {
        self.handlers.get(step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    TimedOut,
    UpstreamFailed,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Succeeded)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunReport {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepOutcome>,
}

impl WorkflowRunReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_success())
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// Runs workflows, enforcing each definition's `max_active_runs`.
#[derive(Debug)]
pub struct WorkflowRunner {
    retry_delay: Duration,
    active: Mutex<HashMap<String, u32>>,
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(60),
            active: Mutex::new(HashMap::new()),
        }
    }
}

impl WorkflowRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between a failed attempt and its retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run every step of `definition`.
    ///
    /// Returns an error only when the run cannot start: the definition is
    /// invalid, a step has no handler, or `max_active_runs` is reached. Step
    /// failures are recorded in the report.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        handlers: &StepHandlers,
    ) -> Result<WorkflowRunReport> {
        let order = definition.execution_order()?;
        if let Some(step) = order.iter().find(|s| handlers.get(&s.name).is_none()) {
            return Err(MaintenanceError::MissingHandler(step.name.clone()));
        }

        let _slot = self.acquire_slot(definition)?;

        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        tracing::info!(workflow = %definition.id, %run_id, steps = order.len(), "Starting workflow run");

        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(order.len());
        for step in order {
            let blocked_by = step.dependencies.iter().find(|dep| {
                !outcomes
                    .iter()
                    .any(|o| &o.step == *dep && o.status.is_success())
            });

            let outcome = match (blocked_by, handlers.get(&step.name)) {
                (Some(dep), _) => {
                    tracing::warn!(workflow = %definition.id, step = %step.name, upstream = %dep, "Skipping step, upstream did not succeed");
                    StepOutcome {
                        step: step.name.clone(),
                        status: StepStatus::UpstreamFailed,
                        attempts: 0,
                        output: None,
                        error: Some(format!("upstream step '{dep}' did not succeed")),
                        started_at: None,
                        finished_at: None,
                    }
                }
                (None, Some(handler)) => {
                    self.run_step(definition, step, handler.as_ref(), run_id)
                        .await
                }
                (None, None) => return Err(MaintenanceError::MissingHandler(step.name.clone())),
            };
            outcomes.push(outcome);
        }

        let report = WorkflowRunReport {
            run_id,
            workflow_id: definition.id.clone(),
            started_at,
            finished_at: Utc::now(),
            steps: outcomes,
        };
        tracing::info!(workflow = %definition.id, %run_id, succeeded = report.succeeded(), "Workflow run finished");
        Ok(report)
    }

    async fn run_step(
        &self,
        definition: &WorkflowDefinition,
        step: &StepDefinition,
        handler: &dyn StepHandler,
        run_id: Uuid,
    ) -> StepOutcome {
        let started_at = Utc::now();
        let max_attempts = step.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let ctx = StepContext {
                run_id,
                workflow_id: definition.id.clone(),
                step: step.name.clone(),
                attempt,
            };
            tracing::info!(step = %step.name, attempt, max_attempts, "Running step");

            let result = match step.execution_timeout {
                Some(timeout) => tokio::time::timeout(timeout, handler.execute(&ctx))
                    .await
                    .unwrap_or_else(|_| {
                        Err(MaintenanceError::StepTimeout {
                            step: step.name.clone(),
                            timeout,
                        })
                    }),
                None => handler.execute(&ctx).await,
            };

            match result {
                Ok(output) => {
                    tracing::info!(step = %step.name, attempt, "Step succeeded");
                    return StepOutcome {
                        step: step.name.clone(),
                        status: StepStatus::Succeeded,
                        attempts: attempt,
                        output: Some(output),
                        error: None,
                        started_at: Some(started_at),
                        finished_at: Some(Utc::now()),
                    };
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(step = %step.name, attempt, error = %e, "Step failed, retrying");
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(step = %step.name, attempt, error = %e, "Step failed");
                    let status = match e {
                        MaintenanceError::StepTimeout { .. } => StepStatus::TimedOut,
                        _ => StepStatus::Failed,
                    };
                    return StepOutcome {
                        step: step.name.clone(),
                        status,
                        attempts: attempt,
                        output: None,
                        error: Some(e.to_string()),
                        started_at: Some(started_at),
                        finished_at: Some(Utc::now()),
                    };
                }
            }
        }
    }

    fn acquire_slot(&self, definition: &WorkflowDefinition) -> Result<ActiveRun<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let count = active.entry(definition.id.clone()).or_insert(0);
        if *count >= definition.max_active_runs {
            return Err(MaintenanceError::TooManyActiveRuns {
                workflow: definition.id.clone(),
                active: *count,
            });
        }
        *count += 1;
        Ok(ActiveRun {
            runner: self,
            workflow: definition.id.clone(),
        })
    }
}

/// Releases a run slot on drop.
struct ActiveRun<'a> {
    runner: &'a WorkflowRunner,
    workflow: String,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut active = self
            .runner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = active.get_mut(&self.workflow) {
            *count = count.saturating_sub(1);
        }
    }
}
