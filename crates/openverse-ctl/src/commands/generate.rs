//! `generate`: fetch the API schema and write the client model files.

use std::path::PathBuf;

use anyhow::Context;
use openverse_codegen::{generate, GeneratorConfig, TargetLanguage};

use crate::cli_config::GenerateConfig;
use crate::output;
use crate::GenerateArgs;

pub(crate) async fn handle_generate_command(
    args: GenerateArgs,
    config: &GenerateConfig,
) -> anyhow::Result<()> {
    let generator = resolve_config(args, config);

    tracing::debug!(?generator, "Resolved generator config");
    let report = generate(&generator).await.with_context(|| {
        format!("failed to generate models from {}", generator.api_url)
    })?;

    output::success(format!(
        "Generated {} model(s) from {}",
        report.model_count, generator.api_url
    ));
    if let Some(schema) = &report.schema_path {
        output::item(schema.display());
    }
    for file in &report.model_files {
        output::item(file.display());
    }
    Ok(())
}

/// Flags first, then the config file, then built-in defaults.
fn resolve_config(args: GenerateArgs, config: &GenerateConfig) -> GeneratorConfig {
    let defaults = GeneratorConfig::default();

    let mut languages: Vec<TargetLanguage> = Vec::new();
    for language in args.languages {
        if !languages.contains(&language) {
            languages.push(language);
        }
    }

    GeneratorConfig {
        api_url: args
            .openverse_api_url
            .or_else(|| config.openverse_api_url.clone())
            .unwrap_or(defaults.api_url),
        output_dir: args
            .output_dir
            .or_else(|| config.output_dir.as_ref().map(PathBuf::from))
            .unwrap_or(defaults.output_dir),
        models: args
            .models
            .or_else(|| config.models.clone())
            .filter(|models| !models.is_empty())
            .unwrap_or(defaults.models),
        languages: if languages.is_empty() {
            defaults.languages
        } else {
            languages
        },
        write_schema: !args.no_schema,
    }
}
