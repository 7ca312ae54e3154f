//! openverse-ctl
//!
//! Generates the Openverse API client models from the live API schema and
//! runs catalog maintenance workflows.

mod cli_config;
mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use openverse_codegen::TargetLanguage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "openverse-ctl",
    version,
    about = "Openverse API model generation and catalog maintenance",
    styles = output::clap_styles()
)]
pub(crate) struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Generate Python and TypeScript client models from the API schema
    Generate(GenerateArgs),

    /// Catalog maintenance workflows
    #[command(subcommand)]
    Maintenance(MaintenanceCommands),
}

#[derive(Debug, Args)]
pub(crate) struct GenerateArgs {
    /// Openverse API base URL [default: https://api.openverse.org]
    #[arg(long, env = "OPENVERSE_API_URL")]
    pub openverse_api_url: Option<String>,

    /// Directory receiving schema.yaml, models.py and models.ts [default: out]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated component schemas to render, in order
    #[arg(long, value_delimiter = ',')]
    pub models: Option<Vec<String>>,

    /// Only render this language (repeatable; python or typescript)
    #[arg(long = "language")]
    pub languages: Vec<TargetLanguage>,

    /// Do not write the fetched schema.yaml
    #[arg(long)]
    pub no_schema: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum MaintenanceCommands {
    /// Decode escaped image tag names and drop the duplicates this creates
    DecodeImageTags(DecodeImageTagsArgs),

    /// Show the tag workflow's steps and batched update payload
    ShowWorkflow {
        /// Table to target
        #[arg(long)]
        table: Option<String>,

        /// Build the payload as a dry run
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Preview decoding and deduplication of a JSON tag list ("-" reads stdin)
    PreviewTags {
        /// JSON file holding a tag list or a list of tag lists
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Args)]
pub(crate) struct DecodeImageTagsArgs {
    /// Catalog database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Orchestrator REST API base URL
    #[arg(long, env = "OPENVERSE_ORCHESTRATOR_URL")]
    pub orchestrator_url: Option<String>,

    #[arg(long, env = "OPENVERSE_ORCHESTRATOR_USERNAME")]
    pub orchestrator_username: Option<String>,

    #[arg(long, env = "OPENVERSE_ORCHESTRATOR_PASSWORD", hide_env_values = true)]
    pub orchestrator_password: Option<String>,

    /// Seconds between batched update status checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Table to repair [default: image]
    #[arg(long)]
    pub table: Option<String>,

    /// Count matching rows without updating them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for krate in ["openverse_ctl", "openverse_codegen", "openverse_maintenance"] {
        filter = filter.add_directive(format!("{krate}={level}").parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli_config::load_cli_config();
    match cli.command {
        Commands::Generate(args) => commands::handle_generate_command(args, &config.generate).await,
        Commands::Maintenance(cmd) => {
            commands::handle_maintenance_command(cmd, &config.maintenance).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        output::error(format!("invalid log filter: {e}"));
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::parse_from([
            "openverse-ctl",
            "generate",
            "--openverse-api-url",
            "http://localhost:50280",
            "--models",
            "Tag,Image",
            "--language",
            "ts",
        ]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.models.unwrap(), vec!["Tag", "Image"]);
        assert_eq!(args.languages, vec![TargetLanguage::TypeScript]);
        assert!(args.output_dir.is_none());
        assert!(!args.no_schema);
    }

    #[test]
    fn test_parse_preview_tags_stdin() {
        let cli = Cli::parse_from(["openverse-ctl", "maintenance", "preview-tags", "-", "--format", "json"]);
        let Commands::Maintenance(MaintenanceCommands::PreviewTags { input, format }) = cli.command else {
            panic!("expected preview-tags");
        };
        assert_eq!(input, PathBuf::from("-"));
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let base = ["openverse-ctl", "maintenance", "decode-image-tags", "--database-url", "postgresql://localhost/openledger"];
        let zero = Cli::try_parse_from(base.iter().copied().chain(["--poll-interval", "0"]));
        assert!(zero.is_err());

        let cli = Cli::try_parse_from(base.iter().copied().chain(["--poll-interval", "15"])).unwrap();
        let Commands::Maintenance(MaintenanceCommands::DecodeImageTags(args)) = cli.command else {
            panic!("expected decode-image-tags");
        };
        assert_eq!(args.poll_interval, Some(15));
    }

    #[test]
    fn test_bad_language_rejected() {
        let result = Cli::try_parse_from(["openverse-ctl", "generate", "--language", "ruby"]);
        assert!(result.is_err());
    }
}
