//! `maintenance`: catalog maintenance workflows.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use openverse_maintenance::decode_image_tags::{workflow_definition, DEFAULT_TABLE};
use openverse_maintenance::tags::{preview, TagPreview};
use openverse_maintenance::{
    DecodeImageTags, RestDagTrigger, Tag, WorkflowDefinition, WorkflowRunReport, WorkflowRunner,
};
use secrecy::SecretString;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

use crate::cli_config::MaintenanceConfig;
use crate::output;
use crate::{DecodeImageTagsArgs, MaintenanceCommands, OutputFormat};

pub(crate) async fn handle_maintenance_command(
    cmd: MaintenanceCommands,
    config: &MaintenanceConfig,
) -> anyhow::Result<()> {
    match cmd {
        MaintenanceCommands::DecodeImageTags(args) => decode_image_tags(args, config).await,
        MaintenanceCommands::ShowWorkflow {
            table,
            dry_run,
            format,
        } => show_workflow(&job(table, dry_run, config), format),
        MaintenanceCommands::PreviewTags { input, format } => preview_tags(&input, format),
    }
}

fn job(table: Option<String>, dry_run: bool, config: &MaintenanceConfig) -> DecodeImageTags {
    let table = table
        .or_else(|| config.table.clone())
        .unwrap_or_else(|| DEFAULT_TABLE.to_string());
    DecodeImageTags::new(table, dry_run)
}

async fn decode_image_tags(
    args: DecodeImageTagsArgs,
    config: &MaintenanceConfig,
) -> anyhow::Result<()> {
    let job = job(args.table, args.dry_run, config);

    let orchestrator_url = args
        .orchestrator_url
        .or_else(|| config.orchestrator_url.clone())
        .context(
            "no orchestrator URL: pass --orchestrator-url, set OPENVERSE_ORCHESTRATOR_URL \
             or add orchestrator-url to .openverse-ctl.toml",
        )?;

    let mut trigger = RestDagTrigger::new(&orchestrator_url)?;
    if let Some(username) = args
        .orchestrator_username
        .or_else(|| config.orchestrator_username.clone())
    {
        let password = args
            .orchestrator_password
            .context("an orchestrator username needs --orchestrator-password")?;
        trigger = trigger.with_basic_auth(username, SecretString::from(password));
    }
    if let Some(seconds) = args.poll_interval.or(config.poll_interval_seconds) {
        if seconds == 0 {
            bail!("poll-interval-seconds must be at least 1");
        }
        trigger = trigger.with_poll_interval(Duration::from_secs(seconds));
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.database_url)
        .await
        .context("failed to connect to the catalog database")?;

    let definition = workflow_definition();
    let handlers = job.handlers(pool, Arc::new(trigger))?;

    output::header(format!("Running {}", definition.id));
    output::label("Table", &job.table_name);
    output::label("Dry run", job.dry_run);

    let report = WorkflowRunner::new().run(&definition, &handlers).await?;
    print_run_report(&report);

    if !report.succeeded() {
        bail!("workflow run {} did not succeed", report.run_id);
    }
    output::success(format!("Workflow run {} succeeded", report.run_id));
    Ok(())
}

fn print_run_report(report: &WorkflowRunReport) {
    output::blank();
    output::header("Steps");
    for step in &report.steps {
        let detail = match &step.error {
            Some(error) => format!("{} ({} attempt(s)): {error}", step.step, step.attempts),
            None => format!("{} ({} attempt(s))", step.step, step.attempts),
        };
        output::step_status(step.status, detail);
    }
}

fn show_workflow(job: &DecodeImageTags, format: OutputFormat) -> anyhow::Result<()> {
    let definition = workflow_definition();
    let conf = job.conf()?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "workflow": definition, "conf": conf });
            output::plain(serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            print_definition(&definition);
            output::blank();
            output::header("Batched update payload");
            output::plain(serde_json::to_string_pretty(&conf)?);
        }
    }
    Ok(())
}

fn print_definition(definition: &WorkflowDefinition) {
    output::header(&definition.id);
    output::dim(&definition.description);
    output::label("Max active runs", definition.max_active_runs);
    output::blank();
    output::header("Steps");
    for step in &definition.steps {
        let mut line = step.name.clone();
        if !step.dependencies.is_empty() {
            line.push_str(&format!(" (after {})", step.dependencies.join(", ")));
        }
        line.push_str(&format!(", retries {}", step.retries));
        if let Some(timeout) = step.execution_timeout {
            line.push_str(&format!(", timeout {}s", timeout.as_secs()));
        }
        output::item(line);
    }
}

/// One tag list, or one list per row.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PreviewInput {
    Rows(Vec<Vec<Tag>>),
    Tags(Vec<Tag>),
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read tags from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

fn preview_tags(input: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let contents = read_input(input)?;
    let rows = match serde_json::from_str::<PreviewInput>(&contents)
        .context("expected a JSON tag list or a list of tag lists")?
    {
        PreviewInput::Rows(rows) => rows,
        PreviewInput::Tags(tags) => vec![tags],
    };

    let previews = rows
        .into_iter()
        .map(preview)
        .collect::<Result<Vec<TagPreview>, _>>()?;

    match format {
        OutputFormat::Json => output::plain(serde_json::to_string_pretty(&previews)?),
        OutputFormat::Text => print_previews(&previews)?,
    }
    Ok(())
}

fn print_previews(previews: &[TagPreview]) -> anyhow::Result<()> {
    for (index, row) in previews.iter().enumerate() {
        if !row.selected {
            output::dim(format!("Row {}: no escaped tag names, unchanged", index + 1));
            continue;
        }
        output::header(format!(
            "Row {}: {} decoded, {} removed",
            index + 1,
            row.decoded,
            row.removed
        ));
        for tag in &row.after {
            output::item(serde_json::to_string(tag)?);
        }
    }

    let selected = previews.iter().filter(|p| p.selected).count();
    output::blank();
    if selected == 0 {
        output::warning("No rows would be updated");
    } else {
        output::success(format!("{selected} of {} row(s) would be updated", previews.len()));
    }
    Ok(())
}
