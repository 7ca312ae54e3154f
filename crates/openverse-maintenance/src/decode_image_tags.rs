//! The `decode_and_deduplicate_image_tags` workflow.
//!
//! Two steps: install `ov_unistr`, then trigger a batched update that
//! decodes escaped tag names on matching rows and keeps one tag per
//! `(name, provider)`. Only images predate the change that stopped the
//! escaping, so `image` is the default table.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tera::Context;

use crate::batched_update::{BatchedUpdateConf, BatchedUpdateTrigger, TriggerBatchedUpdate};
use crate::sql::{check_identifier, SqlTemplates, SELECT_QUERY, UPDATE_QUERY};
use crate::unistr::{EnsureOvUnistr, OV_UNISTR_FUNCTION};
use crate::workflow::{StepDefinition, StepHandlers, WorkflowDefinition};
use crate::Result;

pub const DAG_ID: &str = "decode_and_deduplicate_image_tags";
pub const DEFAULT_TABLE: &str = "image";

pub const ENSURE_OV_UNISTR_STEP: &str = "ensure_ov_unistr";
pub const TRIGGER_BATCHED_UPDATE_STEP: &str = "trigger_batched_update";

/// Execution timeout of the batched update hand-off.
pub const TRIGGER_TIMEOUT: Duration = Duration::from_secs(5 * 60 * 60);

/// jsonpath filter matching tags whose name holds a literal `\xHH` or
/// `\uHHHH`. Backslashes are doubled once for the jsonpath string literal
/// and once more for the regex.
pub const HAS_RAW_ESCAPED_UNICODE: &str =
    r#"(@.name like_regex "\\\\(x)([\\da-f]{2})|\\\\(u)([\\da-f]{4})" flag "i")"#;

/// The workflow's steps and scheduling limits.
pub fn workflow_definition() -> WorkflowDefinition {
    WorkflowDefinition {
        id: DAG_ID.to_string(),
        description: "Decode unicode escape sequences in image tag names and drop tags \
                      duplicated by the decoding."
            .to_string(),
        max_active_runs: 1,
        tags: vec!["database".to_string()],
        steps: vec![
            StepDefinition::new(ENSURE_OV_UNISTR_STEP),
            StepDefinition::new(TRIGGER_BATCHED_UPDATE_STEP)
                .depends_on(ENSURE_OV_UNISTR_STEP)
                .with_retries(0)
                .with_timeout(TRIGGER_TIMEOUT),
        ],
    }
}

/// Parameters of one tag repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeImageTags {
    pub table_name: String,
    pub dry_run: bool,
}

impl Default for DecodeImageTags {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE.to_string(),
            dry_run: false,
        }
    }
}

impl DecodeImageTags {
    pub fn new(table_name: impl Into<String>, dry_run: bool) -> Self {
        Self {
            table_name: table_name.into(),
            dry_run,
        }
    }

    /// `WHERE` clause selecting rows with at least one escaped tag name.
    /// `jsonb_path_query_first` yields NULL for NULL tags, so tagless rows
    /// are never selected.
    pub fn select_query(&self) -> Result<String> {
        let mut context = Context::new();
        context.insert("table_name", check_identifier(&self.table_name)?);
        context.insert("predicate", HAS_RAW_ESCAPED_UNICODE);
        SqlTemplates::load()?.render(SELECT_QUERY, &context)
    }

    /// `SET` clause rebuilding the tag list with decoded names.
    pub fn update_query(&self) -> Result<String> {
        let mut context = Context::new();
        context.insert("table_name", check_identifier(&self.table_name)?);
        context.insert("function_name", OV_UNISTR_FUNCTION);
        SqlTemplates::load()?.render(UPDATE_QUERY, &context)
    }

    /// Hand-off payload for the batched update run.
    pub fn conf(&self) -> Result<BatchedUpdateConf> {
        Ok(BatchedUpdateConf {
            query_id: DAG_ID.to_string(),
            table_name: check_identifier(&self.table_name)?.to_string(),
            select_query: self.select_query()?,
            update_query: self.update_query()?,
            dry_run: self.dry_run,
        })
    }

    /// Handlers for [`workflow_definition`].
    pub fn handlers(
        &self,
        pool: PgPool,
        trigger: Arc<dyn BatchedUpdateTrigger>,
    ) -> Result<StepHandlers> {
        Ok(StepHandlers::new()
            .with(ENSURE_OV_UNISTR_STEP, Arc::new(EnsureOvUnistr::new(pool)))
            .with(
                TRIGGER_BATCHED_UPDATE_STEP,
                Arc::new(TriggerBatchedUpdate::new(trigger, self.conf()?)),
            ))
    }
}
