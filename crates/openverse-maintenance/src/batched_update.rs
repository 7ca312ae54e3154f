//! Hand-off to the orchestrator's `batched_update` workflow.
//!
//! The batched update run selects matching rows into a temporary table and
//! applies `update_query` to them in batches. This crate only builds the
//! payload, triggers the run and waits for it to finish.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;
use uuid::Uuid;

use crate::workflow::{StepContext, StepHandler};
use crate::{MaintenanceError, Result};

/// Workflow id of the batched update run.
pub const BATCHED_UPDATE_DAG_ID: &str = "batched_update";

/// Configuration payload for one batched update run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchedUpdateConf {
    /// Identifies the run's temporary table and progress tracking.
    pub query_id: String,
    pub table_name: String,
    /// `WHERE` clause selecting the rows to update.
    pub select_query: String,
    /// `SET` clause applied to each selected row.
    pub update_query: String,
    pub dry_run: bool,
}

/// State of an orchestrator workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DagRunState {
    Queued,
    Running,
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

impl DagRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DagRunState::Success | DagRunState::Failed)
    }
}

impl fmt::Display for DagRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DagRunState::Queued => "queued",
            DagRunState::Running => "running",
            DagRunState::Success => "success",
            DagRunState::Failed => "failed",
            DagRunState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A triggered run that reached a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct DagRunOutcome {
    pub dag_run_id: String,
    pub state: DagRunState,
}

/// Starts a batched update run and waits for it to complete.
#[async_trait]
pub trait BatchedUpdateTrigger: Send + Sync + fmt::Debug {
    /// Resolves once the run succeeded. A failed run is
    /// [`MaintenanceError::BatchedUpdateFailed`].
    async fn trigger_and_wait(&self, conf: &BatchedUpdateConf) -> Result<DagRunOutcome>;
}

#[derive(Debug, Deserialize)]
struct DagRunResponse {
    dag_run_id: String,
    state: DagRunState,
}

/// Triggers runs through the orchestrator's stable REST API.
pub struct RestDagTrigger {
    client: reqwest::Client,
    api_url: String,
    dag_id: String,
    username: Option<String>,
    password: Option<SecretString>,
    poll_interval: Duration,
    timeout: Duration,
}

impl fmt::Debug for RestDagTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestDagTrigger")
            .field("api_url", &self.api_url)
            .field("dag_id", &self.dag_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RestDagTrigger {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Shorter poll intervals are raised to this.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

    /// Trigger `batched_update` runs on the orchestrator at `api_url`.
    pub fn new(api_url: &str) -> Result<Self> {
        let trimmed = api_url.trim_end_matches('/');
        url::Url::parse(trimmed).map_err(|source| MaintenanceError::InvalidUrl {
            url: api_url.to_string(),
            source,
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: trimmed.to_string(),
            dag_id: BATCHED_UPDATE_DAG_ID.to_string(),
            username: None,
            password: None,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: crate::decode_image_tags::TRIGGER_TIMEOUT,
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    /// Pause between status checks, at least [`Self::MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Self::MIN_POLL_INTERVAL);
        self
    }

    /// Overall wait for the run to reach a terminal state.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn runs_url(&self) -> String {
        format!("{}/api/v1/dags/{}/dagRuns", self.api_url, self.dag_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => request.basic_auth(user, Some(password.expose_secret())),
            _ => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<DagRunResponse> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaintenanceError::OrchestratorResponse {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<DagRunResponse>().await?)
    }
}

#[async_trait]
impl BatchedUpdateTrigger for RestDagTrigger {
    async fn trigger_and_wait(&self, conf: &BatchedUpdateConf) -> Result<DagRunOutcome> {
        let dag_run_id = format!("{}__{}", conf.query_id, Uuid::now_v7());
        let body = json!({ "dag_run_id": dag_run_id, "conf": conf });

        let created = self.send(self.client.post(self.runs_url()).json(&body)).await?;
        tracing::info!(
            dag_id = %self.dag_id,
            dag_run_id = %created.dag_run_id,
            table = %conf.table_name,
            dry_run = conf.dry_run,
            "Triggered batched update"
        );

        let status_url = format!("{}/{}", self.runs_url(), created.dag_run_id);
        let deadline = Instant::now() + self.timeout;
        let mut state = created.state;

        while !state.is_terminal() {
            if Instant::now() + self.poll_interval > deadline {
                return Err(MaintenanceError::BatchedUpdateTimeout {
                    dag_run_id: created.dag_run_id,
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            state = self.send(self.client.get(&status_url)).await?.state;
            tracing::debug!(dag_run_id = %created.dag_run_id, %state, "Polled batched update");
        }

        if state == DagRunState::Failed {
            return Err(MaintenanceError::BatchedUpdateFailed {
                dag_run_id: created.dag_run_id,
                state: state.to_string(),
            });
        }

        tracing::info!(dag_run_id = %created.dag_run_id, "Batched update finished");
        Ok(DagRunOutcome {
            dag_run_id: created.dag_run_id,
            state,
        })
    }
}

/// Step handler handing a fixed payload to a trigger.
#[derive(Debug, Clone)]
pub struct TriggerBatchedUpdate {
    trigger: Arc<dyn BatchedUpdateTrigger>,
    conf: BatchedUpdateConf,
}

impl TriggerBatchedUpdate {
    pub fn new(trigger: Arc<dyn BatchedUpdateTrigger>, conf: BatchedUpdateConf) -> Self {
        Self { trigger, conf }
    }
}

#[async_trait]
impl StepHandler for TriggerBatchedUpdate {
    async fn execute(&self, _ctx: &StepContext) -> Result<Value> {
        let outcome = self.trigger.trigger_and_wait(&self.conf).await?;
        Ok(serde_json::to_value(outcome)?)
    }
}
