//! Openverse catalog maintenance workflows.
//!
//! The `decode_and_deduplicate_image_tags` workflow repairs image tags whose
//! names still carry literal unicode escape sequences, such as `mus\xe9o`
//! or `mus\u00e9o` stored instead of `muséo`. It installs the `ov_unistr`
//! database function and then hands a select/update query pair to the
//! orchestrator's `batched_update` run, which applies the update in batches.
//!
//! - [`workflow`]: workflow definitions, validation and a sequential runner
//! - [`unistr`]: `ov_unistr` installation
//! - [`batched_update`]: hand-off payload and orchestrator trigger
//! - [`decode_image_tags`]: the tag workflow, its SQL fragments and handlers
//! - [`tags`]: in-process decode and deduplicate preview

use std::time::Duration;

pub mod batched_update;
pub mod decode_image_tags;
mod sql;
pub mod tags;
pub mod unistr;
pub mod workflow;

pub use batched_update::{BatchedUpdateConf, BatchedUpdateTrigger, DagRunState, RestDagTrigger};
pub use decode_image_tags::DecodeImageTags;
pub use tags::{decode_and_deduplicate, decode_unicode_escapes, needs_decoding, Tag};
pub use workflow::{
    StepDefinition, StepHandler, StepHandlers, StepOutcome, StepStatus, WorkflowDefinition,
    WorkflowRunReport, WorkflowRunner,
};

pub type Result<T> = std::result::Result<T, MaintenanceError>;

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to render SQL template '{template}': {source}")]
    Template {
        template: String,
        source: tera::Error,
    },

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("workflow '{workflow}' is invalid: {}", findings.join("; "))]
    InvalidWorkflow {
        workflow: String,
        findings: Vec<String>,
    },

    #[error("no handler registered for step '{0}'")]
    MissingHandler(String),

    #[error("workflow '{workflow}' already has {active} active run(s)")]
    TooManyActiveRuns { workflow: String, active: u32 },

    #[error("step '{step}' timed out after {}s", timeout.as_secs())]
    StepTimeout { step: String, timeout: Duration },

    #[error("step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("invalid orchestrator URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("orchestrator request failed: {0}")]
    Orchestrator(#[from] reqwest::Error),

    #[error("orchestrator returned HTTP {status}: {body}")]
    OrchestratorResponse { status: u16, body: String },

    #[error("batched update run '{dag_run_id}' finished in state '{state}'")]
    BatchedUpdateFailed { dag_run_id: String, state: String },

    #[error("batched update run '{dag_run_id}' did not finish within {}s", timeout.as_secs())]
    BatchedUpdateTimeout {
        dag_run_id: String,
        timeout: Duration,
    },

    #[error("invalid tag document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot decode tag name '{name}': {reason}")]
    TagDecode { name: String, reason: String },
}

impl MaintenanceError {
    pub fn step(step: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Step {
            step: step.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn template(template: &str, source: tera::Error) -> Self {
        Self::Template {
            template: template.to_string(),
            source,
        }
    }
}
